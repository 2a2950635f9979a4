use crate::resolver;
use repohist_core::error::{ProviderError, StateError, SyncError};
use repohist_core::types::{ChangesetRecord, EntryKind, RepositoryRecord, RootEntry};
use repohist_provider::HistoryProvider;
use repohist_state::fileset_cache::{self, FilesetRow};
use rusqlite::Connection;
use tracing::{debug, info};

/// Whether the fileset cache may serve a listing request at all.
///
/// The cache only ever covers the repository root. Before any snapshot
/// exists it may only be primed by the default branch; once rows exist, a
/// request qualifies when its ref matches a stored snapshot exactly or is
/// the (moving) default branch.
pub fn is_cache_applicable(
    conn: &Connection,
    repository: &RepositoryRecord,
    path: &str,
    r#ref: &str,
) -> Result<bool, StateError> {
    if !path.is_empty() || r#ref.is_empty() {
        return Ok(false);
    }
    let is_default = repository.default_branch.as_deref() == Some(r#ref);
    if !fileset_cache::any_rows(conn, repository.id)? {
        return Ok(is_default);
    }
    Ok(is_default || fileset_cache::ref_has_rows(conn, repository.id, r#ref)?)
}

/// Root-directory listing for `ref`, served from the fileset cache when the
/// snapshot for the resolved changeset is present, otherwise fetched live
/// and written back as a wholesale snapshot replacement.
///
/// Serving the cache trades a little staleness on a moving default branch
/// for skipping the provider's per-entry last-commit computation; the next
/// live fetch atomically replaces the whole snapshot.
pub fn list_root(
    conn: &mut Connection,
    provider: &dyn HistoryProvider,
    repository: &RepositoryRecord,
    r#ref: &str,
) -> Result<Vec<RootEntry>, SyncError> {
    let applicable = is_cache_applicable(conn, repository, "", r#ref)?;
    let resolved = if r#ref.is_empty() {
        None
    } else {
        resolve_local(conn, provider, repository.id, r#ref)?
    };

    if applicable && let Some(changeset) = &resolved {
        let rows = fileset_cache::read(conn, repository.id, changeset.id)?;
        if !rows.is_empty() {
            debug!(
                repository_id = repository.id,
                r#ref,
                scmid = %changeset.scmid,
                "serving root listing from fileset cache"
            );
            let mut entries: Vec<RootEntry> = rows.into_iter().map(row_to_entry).collect();
            enrich_entries(conn, repository.id, &mut entries)?;
            return Ok(entries);
        }
    }

    // Live fetch, including the expensive per-entry last-commit lookups.
    let mut entries = provider.root_entries(r#ref)?;
    enrich_entries(conn, repository.id, &mut entries)?;

    // Write back only when the ref pins down a local changeset; otherwise
    // there is no consistent snapshot key to store under.
    if let Some(changeset) = &resolved {
        let rows: Vec<FilesetRow> = entries
            .iter()
            .map(|e| entry_to_row(e, changeset))
            .collect();
        fileset_cache::replace_all(conn, repository.id, r#ref, &rows)?;
        info!(
            repository_id = repository.id,
            r#ref,
            entries = entries.len(),
            "fileset cache refreshed"
        );
    }
    Ok(entries)
}

/// Resolve `ref` through the provider and then against the local store.
/// A ref unknown to either side degrades to `None` (cache bypass), it is
/// never an error; transport failures still propagate.
fn resolve_local(
    conn: &Connection,
    provider: &dyn HistoryProvider,
    repository_id: i64,
    r#ref: &str,
) -> Result<Option<ChangesetRecord>, SyncError> {
    let commit_id = match provider.resolve_ref(r#ref) {
        Ok(id) => id,
        Err(ProviderError::NotFound { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(resolver::resolve(conn, repository_id, &commit_id)?)
}

/// Fill committer/commit-time for every entry whose last commit is stored
/// locally. Applied to both cache hits and live fetches so the two paths
/// return identical listings.
fn enrich_entries(
    conn: &Connection,
    repository_id: i64,
    entries: &mut [RootEntry],
) -> Result<(), StateError> {
    for entry in entries {
        if let Some(last_commit_id) = &entry.last_commit_id
            && let Some(changeset) = resolver::resolve(conn, repository_id, last_commit_id)?
        {
            entry.last_committer = Some(changeset.committer);
            entry.last_committed_on = Some(changeset.committed_on);
        }
    }
    Ok(())
}

fn row_to_entry(row: FilesetRow) -> RootEntry {
    let kind = if row.size.is_none() {
        EntryKind::Dir
    } else {
        EntryKind::File
    };
    RootEntry {
        name: row.name,
        path: row.path,
        kind,
        size: row.size.map(|s| s as u64),
        last_commit_id: Some(row.latest_commit_id),
        last_committer: None,
        last_committed_on: None,
    }
}

fn entry_to_row(entry: &RootEntry, snapshot: &ChangesetRecord) -> FilesetRow {
    FilesetRow {
        changeset_id: snapshot.id,
        name: entry.name.clone(),
        path: entry.path.clone(),
        size: entry.size.map(|s| s as i64),
        latest_commit_id: entry
            .last_commit_id
            .clone()
            .unwrap_or_else(|| snapshot.scmid.clone()),
    }
}
