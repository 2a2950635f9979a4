use repohist_core::error::StateError;
use repohist_core::types::ChangesetRecord;
use repohist_state::changesets;
use rusqlite::Connection;

/// Resolve an opaque identifier to a locally persisted changeset.
///
/// Lookup order: exact scmid match, then bounded short-hash prefix match
/// (at least seven hex characters, and only when exactly one stored scmid
/// carries the prefix). An empty name resolves to nothing.
pub fn resolve(
    conn: &Connection,
    repository_id: i64,
    name: &str,
) -> Result<Option<ChangesetRecord>, StateError> {
    if name.is_empty() {
        return Ok(None);
    }
    if let Some(found) = changesets::find_by_scmid(conn, repository_id, name)? {
        return Ok(Some(found));
    }
    changesets::find_by_scmid_prefix(conn, repository_id, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use repohist_state::changesets::NewChangeset;
    use repohist_state::{db, repositories, schema};
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, Connection, i64) {
        let dir = tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
        schema::create_tables(&conn).unwrap();
        let repo =
            repositories::create_repository(&conn, "https://github.com/acme/widget", None).unwrap();
        (dir, conn, repo.id)
    }

    fn insert(conn: &Connection, repo: i64, scmid: &str) {
        changesets::insert_changeset(
            conn,
            &NewChangeset {
                repository_id: repo,
                revision: scmid,
                scmid,
                committer: "alice",
                committed_on: "2024-01-01T00:00:00Z",
                comments: "commit",
            },
            &[],
        )
        .unwrap();
    }

    #[test]
    fn empty_name_resolves_to_nothing() {
        let (_dir, conn, repo) = setup();
        assert!(resolve(&conn, repo, "").unwrap().is_none());
    }

    #[test]
    fn exact_match_wins() {
        let (_dir, conn, repo) = setup();
        let full = "abcdef0123456789abcdef0123456789abcdef01";
        insert(&conn, repo, full);
        let found = resolve(&conn, repo, full).unwrap().unwrap();
        assert_eq!(found.scmid, full);
    }

    #[test]
    fn short_hash_falls_back_to_prefix() {
        let (_dir, conn, repo) = setup();
        let full = "abcdef0123456789abcdef0123456789abcdef01";
        insert(&conn, repo, full);
        let found = resolve(&conn, repo, "abcdef01").unwrap().unwrap();
        assert_eq!(found.scmid, full);
    }

    #[test]
    fn unknown_and_non_hash_names_resolve_to_nothing() {
        let (_dir, conn, repo) = setup();
        insert(&conn, repo, "abcdef0123456789abcdef0123456789abcdef01");
        assert!(resolve(&conn, repo, "feature/login").unwrap().is_none());
        assert!(resolve(&conn, repo, "0000000000").unwrap().is_none());
    }
}
