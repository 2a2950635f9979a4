use crate::paginator::{self, ProviderPager};
use crate::resolver;
use repohist_core::constants::{PAGE_WINDOW, PER_PAGE};
use repohist_core::error::SyncError;
use repohist_core::types::{Revision, Watermark};
use repohist_provider::HistoryProvider;
use repohist_state::changesets::{self, NewChangeset};
use repohist_state::repositories;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Paging parameters for one sync pass.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub per_page: u32,
    pub page_window: u32,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            per_page: PER_PAGE,
            page_window: PAGE_WINDOW,
        }
    }
}

/// What one sync pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Commits the paginator handed back, pre-dedup.
    pub fetched: usize,
    /// Changesets actually created.
    pub created: usize,
    /// Watermark after the pass, when one was written.
    pub watermark: Option<Watermark>,
}

/// Ingest new commits for a repository. Idempotent and no-op-safe: when the
/// remote has nothing new this performs no writes at all.
///
/// Remote failures anywhere before persistence propagate with nothing
/// committed and the watermark untouched; a failure inside the persistence
/// transaction rolls back both passes. Concurrent calls for the same
/// repository are not coordinated here and must be serialized by the caller.
pub fn fetch_changesets(
    conn: &mut Connection,
    provider: &dyn HistoryProvider,
    repository_id: i64,
) -> Result<SyncOutcome, SyncError> {
    fetch_changesets_with(conn, provider, repository_id, SyncOptions::default())
}

pub fn fetch_changesets_with(
    conn: &mut Connection,
    provider: &dyn HistoryProvider,
    repository_id: i64,
    options: SyncOptions,
) -> Result<SyncOutcome, SyncError> {
    let watermark = repositories::read_watermark(conn, repository_id)?;

    let pager = ProviderPager::new(provider, watermark.as_ref(), options.per_page);
    let candidates =
        paginator::find_new_revisions(&pager, watermark.as_ref(), options.page_window)?;
    if candidates.is_empty() {
        info!(repository_id, "sync: already current");
        return Ok(SyncOutcome::default());
    }

    // Dedup: one explicit set difference against the store, never a filter
    // while iterating, and never a timestamp comparison.
    let candidate_ids: Vec<String> = candidates.iter().map(|r| r.scmid.clone()).collect();
    let existing = changesets::existing_scmids(conn, repository_id, &candidate_ids)?;
    let mut seen = HashSet::new();
    let mut surviving: Vec<Revision> = candidates
        .iter()
        .filter(|r| !existing.contains(&r.scmid) && seen.insert(r.scmid.clone()))
        .cloned()
        .collect();

    let outcome = if surviving.is_empty() {
        // Nothing to create, but the batch proves the remote moved past the
        // stored watermark. Advance it from the pre-dedup batch so the next
        // pass does not re-scan the same fully-known pages forever.
        SyncOutcome {
            fetched: candidates.len(),
            created: 0,
            watermark: advance_watermark_past(conn, repository_id, &watermark, &candidates)?,
        }
    } else {
        // Enrich every surviving candidate before anything is written: one
        // provider call per commit, and a single failure aborts the whole
        // pass with no partial effect.
        for revision in &mut surviving {
            let changes = provider.file_changes(&revision.scmid).map_err(|e| {
                SyncError::IncompleteFileChanges {
                    scmid: revision.scmid.clone(),
                    detail: e.to_string(),
                }
            })?;
            revision.file_changes = Some(changes);
        }

        let created = persist_two_pass(conn, repository_id, &surviving)?;
        let watermark = advance_watermark_past(conn, repository_id, &watermark, &surviving)?;
        SyncOutcome {
            fetched: candidates.len(),
            created,
            watermark,
        }
    };

    info!(
        repository_id,
        fetched = outcome.fetched,
        created = outcome.created,
        "sync pass complete"
    );
    Ok(outcome)
}

/// Persist a batch in one transaction, two passes. Pass A creates every
/// changeset and its file changes, building a scmid-to-rowid map. Pass B
/// walks the same batch again and attaches parents, resolving each declared
/// parent first against the map, then against the store. Candidates are not
/// guaranteed to arrive in topological order, so links can only be made once
/// every row of the batch exists.
fn persist_two_pass(
    conn: &mut Connection,
    repository_id: i64,
    batch: &[Revision],
) -> Result<usize, SyncError> {
    let tx = conn.transaction().map_err(repohist_core::error::StateError::sqlite)?;

    let mut created_ids: HashMap<&str, i64> = HashMap::with_capacity(batch.len());
    for revision in batch {
        let file_changes = revision.file_changes.as_deref().unwrap_or(&[]);
        let id = changesets::insert_changeset(
            &tx,
            &NewChangeset {
                repository_id,
                revision: &revision.scmid,
                scmid: &revision.scmid,
                committer: &revision.author,
                committed_on: &revision.committed_on,
                comments: &revision.message,
            },
            file_changes,
        )?;
        created_ids.insert(revision.scmid.as_str(), id);
    }

    for revision in batch {
        let mut parent_ids = Vec::with_capacity(revision.parents.len());
        for parent in &revision.parents {
            let resolved = match created_ids.get(parent.as_str()) {
                Some(id) => Some(*id),
                None => resolver::resolve(&tx, repository_id, parent)?.map(|cs| cs.id),
            };
            match resolved {
                Some(id) => parent_ids.push(id),
                // Orphan parent: outside both the batch and the store.
                // Tolerated; the link is simply omitted.
                None => warn!(
                    repository_id,
                    scmid = %revision.scmid,
                    parent = %parent,
                    "parent not resolvable, omitting link"
                ),
            }
        }
        if !parent_ids.is_empty() {
            changesets::set_parents(&tx, created_ids[revision.scmid.as_str()], &parent_ids)?;
        }
    }

    tx.commit().map_err(repohist_core::error::StateError::sqlite)?;
    Ok(batch.len())
}

/// Move the watermark to the newest (date, id) cursor in `batch`, unless the
/// stored watermark is already at or past it.
fn advance_watermark_past(
    conn: &Connection,
    repository_id: i64,
    current: &Option<Watermark>,
    batch: &[Revision],
) -> Result<Option<Watermark>, SyncError> {
    let Some(newest) = batch.iter().map(Revision::cursor).max() else {
        return Ok(None);
    };
    if let Some(current) = current
        && *current >= newest
    {
        return Ok(None);
    }
    repositories::advance_watermark(conn, repository_id, &newest)?;
    Ok(Some(newest))
}
