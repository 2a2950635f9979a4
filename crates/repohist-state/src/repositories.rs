use repohist_core::error::StateError;
use repohist_core::types::{RepositoryRecord, Watermark};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

/// Register a repository to track. Fails if the URL is already registered.
pub fn create_repository(
    conn: &Connection,
    root_url: &str,
    default_branch: Option<&str>,
) -> Result<RepositoryRecord, StateError> {
    conn.execute(
        "INSERT INTO repositories (root_url, default_branch, created_at, updated_at)
         VALUES (?1, ?2, datetime('now'), datetime('now'))",
        params![root_url, default_branch],
    )
    .map_err(StateError::sqlite)?;
    let id = conn.last_insert_rowid();
    info!(root_url, id, "repository registered");
    find_by_id(conn, id)?.ok_or_else(|| StateError::RepositoryNotFound {
        repository: root_url.to_string(),
    })
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<RepositoryRecord>, StateError> {
    conn.query_row(
        "SELECT id, root_url, default_branch, last_committed_date, last_committed_id,
                created_at, updated_at
         FROM repositories WHERE id = ?1",
        params![id],
        row_to_repository,
    )
    .optional()
    .map_err(StateError::sqlite)
}

pub fn find_by_url(conn: &Connection, root_url: &str) -> Result<Option<RepositoryRecord>, StateError> {
    conn.query_row(
        "SELECT id, root_url, default_branch, last_committed_date, last_committed_id,
                created_at, updated_at
         FROM repositories WHERE root_url = ?1",
        params![root_url],
        row_to_repository,
    )
    .optional()
    .map_err(StateError::sqlite)
}

/// Record the default branch reported by the provider.
pub fn set_default_branch(
    conn: &Connection,
    repository_id: i64,
    default_branch: &str,
) -> Result<(), StateError> {
    conn.execute(
        "UPDATE repositories SET default_branch = ?2, updated_at = datetime('now')
         WHERE id = ?1",
        params![repository_id, default_branch],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

pub fn read_watermark(
    conn: &Connection,
    repository_id: i64,
) -> Result<Option<Watermark>, StateError> {
    let repo = find_by_id(conn, repository_id)?.ok_or(StateError::RepositoryNotFound {
        repository: repository_id.to_string(),
    })?;
    Ok(repo.watermark)
}

/// Advance the fetch watermark. A narrow metadata write: touches only the
/// two watermark columns and `updated_at`, never the rest of the row.
pub fn advance_watermark(
    conn: &Connection,
    repository_id: i64,
    watermark: &Watermark,
) -> Result<(), StateError> {
    conn.execute(
        "UPDATE repositories
         SET last_committed_date = ?2, last_committed_id = ?3, updated_at = datetime('now')
         WHERE id = ?1",
        params![
            repository_id,
            watermark.last_committed_date,
            watermark.last_committed_id
        ],
    )
    .map_err(StateError::sqlite)?;
    info!(
        repository_id,
        last_committed_id = %watermark.last_committed_id,
        "watermark advanced"
    );
    Ok(())
}

/// Drop the watermark, forcing the next sync to scan from the beginning.
pub fn clear_watermark(conn: &Connection, repository_id: i64) -> Result<(), StateError> {
    conn.execute(
        "UPDATE repositories
         SET last_committed_date = NULL, last_committed_id = NULL, updated_at = datetime('now')
         WHERE id = ?1",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

fn row_to_repository(row: &rusqlite::Row<'_>) -> rusqlite::Result<RepositoryRecord> {
    let date: Option<String> = row.get(3)?;
    let id: Option<String> = row.get(4)?;
    let watermark = match (date, id) {
        (Some(last_committed_date), Some(last_committed_id)) => Some(Watermark {
            last_committed_date,
            last_committed_id,
        }),
        _ => None,
    };
    Ok(RepositoryRecord {
        id: row.get(0)?,
        root_url: row.get(1)?,
        default_branch: row.get(2)?,
        watermark,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
