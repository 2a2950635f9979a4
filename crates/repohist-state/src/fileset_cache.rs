use repohist_core::error::StateError;
use rusqlite::{Connection, params};
use tracing::info;

/// One cached root-listing row. `size` is NULL for directories; `revision`
/// holds the ref string the snapshot was requested under, so a whole
/// snapshot can be replaced per (repository, ref).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesetRow {
    pub changeset_id: i64,
    pub name: String,
    pub path: String,
    pub size: Option<i64>,
    pub latest_commit_id: String,
}

/// Read the cached snapshot for (repository, changeset), in listing order.
pub fn read(
    conn: &Connection,
    repository_id: i64,
    changeset_id: i64,
) -> Result<Vec<FilesetRow>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT changeset_id, name, path, size, latest_commit_id
             FROM root_filesets
             WHERE repository_id = ?1 AND changeset_id = ?2
             ORDER BY id",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![repository_id, changeset_id], |row| {
            Ok(FilesetRow {
                changeset_id: row.get(0)?,
                name: row.get(1)?,
                path: row.get(2)?,
                size: row.get(3)?,
                latest_commit_id: row.get(4)?,
            })
        })
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Replace the snapshot stored under (repository, ref) with `rows`, in one
/// transaction. A snapshot is always swapped as a whole set, never patched.
pub fn replace_all(
    conn: &mut Connection,
    repository_id: i64,
    r#ref: &str,
    rows: &[FilesetRow],
) -> Result<(), StateError> {
    let tx = conn.transaction().map_err(StateError::sqlite)?;
    tx.execute(
        "DELETE FROM root_filesets WHERE repository_id = ?1 AND revision = ?2",
        params![repository_id, r#ref],
    )
    .map_err(StateError::sqlite)?;
    for row in rows {
        tx.execute(
            "INSERT INTO root_filesets
                 (repository_id, revision, changeset_id, name, path, size, latest_commit_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                repository_id,
                r#ref,
                row.changeset_id,
                row.name,
                row.path,
                row.size,
                row.latest_commit_id
            ],
        )
        .map_err(StateError::sqlite)?;
    }
    tx.commit().map_err(StateError::sqlite)?;
    info!(
        repository_id,
        r#ref,
        rows = rows.len(),
        "root fileset snapshot replaced"
    );
    Ok(())
}

/// Whether any cache row exists for this repository at all.
pub fn any_rows(conn: &Connection, repository_id: i64) -> Result<bool, StateError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM root_filesets WHERE repository_id = ?1)",
        params![repository_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// Whether a snapshot is stored under exactly this ref string.
pub fn ref_has_rows(
    conn: &Connection,
    repository_id: i64,
    r#ref: &str,
) -> Result<bool, StateError> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM root_filesets WHERE repository_id = ?1 AND revision = ?2)",
        params![repository_id, r#ref],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}
