use repohist_core::constants::{MIN_SHORT_HASH_LEN, SCMID_CHUNK};
use repohist_core::error::StateError;
use repohist_core::types::{ChangesetRecord, FileChange};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;
use tracing::info;

/// Fields for a changeset about to be created. Parent links are attached
/// separately, after every row in the batch exists.
#[derive(Debug, Clone)]
pub struct NewChangeset<'a> {
    pub repository_id: i64,
    pub revision: &'a str,
    pub scmid: &'a str,
    pub committer: &'a str,
    pub committed_on: &'a str,
    pub comments: &'a str,
}

/// Insert a changeset row plus its file changes, returning the new rowid.
pub fn insert_changeset(
    conn: &Connection,
    changeset: &NewChangeset<'_>,
    file_changes: &[FileChange],
) -> Result<i64, StateError> {
    conn.execute(
        "INSERT INTO changesets (repository_id, revision, scmid, committer, committed_on, comments)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            changeset.repository_id,
            changeset.revision,
            changeset.scmid,
            changeset.committer,
            changeset.committed_on,
            changeset.comments
        ],
    )
    .map_err(StateError::sqlite)?;
    let id = conn.last_insert_rowid();

    for change in file_changes {
        conn.execute(
            "INSERT INTO file_changes (changeset_id, action, path, from_path)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, change.action.as_str(), change.path, change.from_path],
        )
        .map_err(StateError::sqlite)?;
    }
    Ok(id)
}

/// Which of `candidates` are already stored for this repository.
///
/// Queried in chunks to bound statement size; the caller computes the set
/// difference once, rather than filtering while iterating.
pub fn existing_scmids(
    conn: &Connection,
    repository_id: i64,
    candidates: &[String],
) -> Result<HashSet<String>, StateError> {
    let mut existing = HashSet::new();
    for chunk in candidates.chunks(SCMID_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT scmid FROM changesets WHERE repository_id = ?1 AND scmid IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
        let mut sqlite_params: Vec<&dyn rusqlite::ToSql> = vec![&repository_id];
        for scmid in chunk {
            sqlite_params.push(scmid);
        }
        let rows = stmt
            .query_map(sqlite_params.as_slice(), |row| row.get::<_, String>(0))
            .map_err(StateError::sqlite)?;
        for row in rows {
            existing.insert(row.map_err(StateError::sqlite)?);
        }
    }
    Ok(existing)
}

/// Replace the ordered parent links of a changeset.
pub fn set_parents(
    conn: &Connection,
    changeset_id: i64,
    parent_ids: &[i64],
) -> Result<(), StateError> {
    conn.execute(
        "DELETE FROM changeset_parents WHERE changeset_id = ?1",
        params![changeset_id],
    )
    .map_err(StateError::sqlite)?;
    for (position, parent_id) in parent_ids.iter().enumerate() {
        conn.execute(
            "INSERT INTO changeset_parents (changeset_id, parent_id, position)
             VALUES (?1, ?2, ?3)",
            params![changeset_id, parent_id, position as i64],
        )
        .map_err(StateError::sqlite)?;
    }
    Ok(())
}

/// Ordered parent rowids of a changeset.
pub fn parents_of(conn: &Connection, changeset_id: i64) -> Result<Vec<i64>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT parent_id FROM changeset_parents
             WHERE changeset_id = ?1 ORDER BY position",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![changeset_id], |row| row.get(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<ChangesetRecord>, StateError> {
    conn.query_row(
        "SELECT id, repository_id, revision, scmid, committer, committed_on, comments
         FROM changesets WHERE id = ?1",
        params![id],
        row_to_changeset,
    )
    .optional()
    .map_err(StateError::sqlite)
}

/// Exact scmid lookup.
pub fn find_by_scmid(
    conn: &Connection,
    repository_id: i64,
    scmid: &str,
) -> Result<Option<ChangesetRecord>, StateError> {
    conn.query_row(
        "SELECT id, repository_id, revision, scmid, committer, committed_on, comments
         FROM changesets WHERE repository_id = ?1 AND scmid = ?2",
        params![repository_id, scmid],
        row_to_changeset,
    )
    .optional()
    .map_err(StateError::sqlite)
}

/// Short-hash prefix lookup. Requires at least `MIN_SHORT_HASH_LEN`
/// characters and exactly one stored match; an ambiguous prefix resolves to
/// nothing rather than picking an arbitrary winner.
pub fn find_by_scmid_prefix(
    conn: &Connection,
    repository_id: i64,
    prefix: &str,
) -> Result<Option<ChangesetRecord>, StateError> {
    if prefix.len() < MIN_SHORT_HASH_LEN || !prefix.chars().all(|c| c.is_ascii_hexdigit()) {
        return Ok(None);
    }
    let mut stmt = conn
        .prepare(
            "SELECT id, repository_id, revision, scmid, committer, committed_on, comments
             FROM changesets
             WHERE repository_id = ?1 AND scmid >= ?2 AND scmid < ?3
             LIMIT 2",
        )
        .map_err(StateError::sqlite)?;
    // Range scan over the hex keyspace: [prefix, prefix~) where `~` sorts
    // after every hex digit.
    let upper = format!("{prefix}~");
    let rows = stmt
        .query_map(params![repository_id, prefix, upper], row_to_changeset)
        .map_err(StateError::sqlite)?;
    let matches: Vec<ChangesetRecord> = rows
        .collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)?;
    match matches.len() {
        1 => Ok(matches.into_iter().next()),
        _ => Ok(None),
    }
}

pub fn file_changes_of(
    conn: &Connection,
    changeset_id: i64,
) -> Result<Vec<FileChange>, StateError> {
    use repohist_core::types::FileAction;
    let mut stmt = conn
        .prepare(
            "SELECT action, path, from_path FROM file_changes
             WHERE changeset_id = ?1 ORDER BY id",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![changeset_id], |row| {
            let action: String = row.get(0)?;
            Ok((action, row.get::<_, String>(1)?, row.get::<_, Option<String>>(2)?))
        })
        .map_err(StateError::sqlite)?;
    let mut out = Vec::new();
    for row in rows {
        let (action, path, from_path) = row.map_err(StateError::sqlite)?;
        let action = FileAction::parse_action(&action)
            .ok_or_else(|| StateError::Sqlite(format!("unknown file action `{action}`")))?;
        out.push(FileChange {
            action,
            path,
            from_path,
        });
    }
    Ok(out)
}

pub fn changeset_count(conn: &Connection, repository_id: i64) -> Result<u64, StateError> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM changesets WHERE repository_id = ?1",
            params![repository_id],
            |row| row.get(0),
        )
        .map_err(StateError::sqlite)?;
    Ok(count as u64)
}

/// Wholesale wipe of a repository's history: changesets, their parent links
/// and file changes, the fileset cache, and the watermark. The only way a
/// changeset is ever deleted.
pub fn clear_repository(conn: &mut Connection, repository_id: i64) -> Result<(), StateError> {
    let tx = conn.transaction().map_err(StateError::sqlite)?;
    tx.execute(
        "DELETE FROM root_filesets WHERE repository_id = ?1",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    tx.execute(
        "DELETE FROM changeset_parents WHERE changeset_id IN
             (SELECT id FROM changesets WHERE repository_id = ?1)",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    tx.execute(
        "DELETE FROM file_changes WHERE changeset_id IN
             (SELECT id FROM changesets WHERE repository_id = ?1)",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    tx.execute(
        "DELETE FROM changesets WHERE repository_id = ?1",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    tx.execute(
        "UPDATE repositories
         SET last_committed_date = NULL, last_committed_id = NULL, updated_at = datetime('now')
         WHERE id = ?1",
        params![repository_id],
    )
    .map_err(StateError::sqlite)?;
    tx.commit().map_err(StateError::sqlite)?;
    info!(repository_id, "repository history cleared");
    Ok(())
}

fn row_to_changeset(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChangesetRecord> {
    Ok(ChangesetRecord {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        revision: row.get(2)?,
        scmid: row.get(3)?,
        committer: row.get(4)?,
        committed_on: row.get(5)?,
        comments: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, repositories, schema};
    use repohist_core::types::FileAction;
    use tempfile::tempdir;

    fn test_repo() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
        schema::create_tables(&conn).unwrap();
        let repo =
            repositories::create_repository(&conn, "https://github.com/acme/widget", None).unwrap();
        (dir, conn, repo.id)
    }

    fn insert(conn: &Connection, repo: i64, scmid: &str, committed_on: &str) -> i64 {
        insert_changeset(
            conn,
            &NewChangeset {
                repository_id: repo,
                revision: scmid,
                scmid,
                committer: "alice",
                committed_on,
                comments: "commit",
            },
            &[],
        )
        .unwrap()
    }

    #[test]
    fn insert_with_file_changes() {
        let (_dir, conn, repo) = test_repo();
        let changes = vec![
            FileChange {
                action: FileAction::Add,
                path: "src/lib.rs".into(),
                from_path: None,
            },
            FileChange {
                action: FileAction::Modify,
                path: "README.md".into(),
                from_path: Some("README".into()),
            },
        ];
        let id = insert_changeset(
            &conn,
            &NewChangeset {
                repository_id: repo,
                revision: "aaaa111",
                scmid: "aaaa1111aaaa1111aaaa1111aaaa1111aaaa1111",
                committer: "alice",
                committed_on: "2024-01-01T00:00:00Z",
                comments: "initial",
            },
            &changes,
        )
        .unwrap();

        assert_eq!(file_changes_of(&conn, id).unwrap(), changes);
    }

    #[test]
    fn existing_scmids_returns_only_known_subset() {
        let (_dir, conn, repo) = test_repo();
        insert(&conn, repo, "aaaaaaaaaa", "2024-01-01T00:00:00Z");
        insert(&conn, repo, "bbbbbbbbbb", "2024-01-02T00:00:00Z");

        let candidates: Vec<String> = vec![
            "aaaaaaaaaa".into(),
            "bbbbbbbbbb".into(),
            "cccccccccc".into(),
        ];
        let existing = existing_scmids(&conn, repo, &candidates).unwrap();
        assert_eq!(existing.len(), 2);
        assert!(existing.contains("aaaaaaaaaa"));
        assert!(!existing.contains("cccccccccc"));
    }

    #[test]
    fn existing_scmids_handles_more_than_one_chunk() {
        let (_dir, conn, repo) = test_repo();
        // 250 candidates forces three chunks of 100.
        let candidates: Vec<String> = (0..250).map(|i| format!("{i:040x}")).collect();
        for scmid in candidates.iter().step_by(2) {
            insert(&conn, repo, scmid, "2024-01-01T00:00:00Z");
        }
        let existing = existing_scmids(&conn, repo, &candidates).unwrap();
        assert_eq!(existing.len(), 125);
    }

    #[test]
    fn existing_scmids_is_scoped_to_repository() {
        let (_dir, conn, repo) = test_repo();
        let other =
            repositories::create_repository(&conn, "https://github.com/acme/other", None).unwrap();
        insert(&conn, other.id, "aaaaaaaaaa", "2024-01-01T00:00:00Z");

        let existing = existing_scmids(&conn, repo, &["aaaaaaaaaa".to_string()]).unwrap();
        assert!(existing.is_empty());
    }

    #[test]
    fn set_parents_is_ordered_and_replaceable() {
        let (_dir, conn, repo) = test_repo();
        let child = insert(&conn, repo, "cccccccccc", "2024-01-03T00:00:00Z");
        let p1 = insert(&conn, repo, "aaaaaaaaaa", "2024-01-01T00:00:00Z");
        let p2 = insert(&conn, repo, "bbbbbbbbbb", "2024-01-02T00:00:00Z");

        set_parents(&conn, child, &[p2, p1]).unwrap();
        assert_eq!(parents_of(&conn, child).unwrap(), vec![p2, p1]);

        set_parents(&conn, child, &[p1]).unwrap();
        assert_eq!(parents_of(&conn, child).unwrap(), vec![p1]);
    }

    #[test]
    fn prefix_lookup_requires_minimum_length_and_uniqueness() {
        let (_dir, conn, repo) = test_repo();
        insert(
            &conn,
            repo,
            "abcdef0123456789abcdef0123456789abcdef01",
            "2024-01-01T00:00:00Z",
        );
        insert(
            &conn,
            repo,
            "abcdef9999999999999999999999999999999999",
            "2024-01-02T00:00:00Z",
        );

        // Too short, even though it would match.
        assert!(
            find_by_scmid_prefix(&conn, repo, "abcdef")
                .unwrap()
                .is_none()
        );
        // Long enough and unique.
        let found = find_by_scmid_prefix(&conn, repo, "abcdef01")
            .unwrap()
            .unwrap();
        assert!(found.scmid.starts_with("abcdef01"));
        // Ambiguous prefix: two stored scmids share "abcdef012".
        insert(
            &conn,
            repo,
            "abcdef0123456789ffffffffffffffffffffffff",
            "2024-01-03T00:00:00Z",
        );
        assert!(
            find_by_scmid_prefix(&conn, repo, "abcdef012")
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn clear_repository_removes_everything() {
        let (_dir, mut conn, repo) = test_repo();
        let parent = insert(&conn, repo, "aaaaaaaaaa", "2024-01-01T00:00:00Z");
        let child = insert(&conn, repo, "bbbbbbbbbb", "2024-01-02T00:00:00Z");
        set_parents(&conn, child, &[parent]).unwrap();
        repositories::advance_watermark(
            &conn,
            repo,
            &repohist_core::types::Watermark {
                last_committed_date: "2024-01-02T00:00:00Z".into(),
                last_committed_id: "bbbbbbbbbb".into(),
            },
        )
        .unwrap();

        clear_repository(&mut conn, repo).unwrap();
        assert_eq!(changeset_count(&conn, repo).unwrap(), 0);
        assert!(repositories::read_watermark(&conn, repo).unwrap().is_none());
    }
}
