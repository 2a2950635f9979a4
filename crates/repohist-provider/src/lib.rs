pub mod github;

use repohist_core::constants::DEFAULT_BRANCH_NAMES;
use repohist_core::error::ProviderError;
use repohist_core::types::{Branch, FileChange, Revision, RootEntry, Watermark};

/// The remote history collaborator: a hash-identified, immutable commit
/// history reachable only through a page-based, newest-first listing API.
///
/// Every call either returns a result or fails outright; retry, timeout,
/// and backoff are not this layer's concern.
pub trait HistoryProvider: Send + Sync {
    /// All branch heads, with the provider's default flagged when known.
    fn branches(&self) -> Result<Vec<Branch>, ProviderError>;

    /// One page of the commit listing, 1-based, newest-first, scoped to
    /// `path` (empty = whole repository). `watermark` may be used by the
    /// provider to bound the listing; it must never reorder it.
    fn commits(
        &self,
        path: &str,
        watermark: Option<&Watermark>,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Revision>, ProviderError>;

    /// The file-level changes of one commit.
    fn file_changes(&self, commit_id: &str) -> Result<Vec<FileChange>, ProviderError>;

    /// Resolve a ref (branch name, tag, hash, short hash) to a commit id.
    fn resolve_ref(&self, r#ref: &str) -> Result<String, ProviderError>;

    /// Root-directory listing at `ref`, including per-entry last-commit ids.
    /// The expensive call the directory cache exists to avoid.
    fn root_entries(&self, r#ref: &str) -> Result<Vec<RootEntry>, ProviderError>;

    /// Default branch: the one the provider flags, else the first of the
    /// conventional names present, else the first branch by name.
    fn default_branch(&self) -> Result<Option<String>, ProviderError> {
        let branches = self.branches()?;
        if let Some(flagged) = branches.iter().find(|b| b.is_default) {
            return Ok(Some(flagged.name.clone()));
        }
        for candidate in DEFAULT_BRANCH_NAMES {
            if let Some(found) = branches.iter().find(|b| b.name == *candidate) {
                return Ok(Some(found.name.clone()));
            }
        }
        Ok(branches.first().map(|b| b.name.clone()))
    }
}
