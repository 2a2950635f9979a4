use repohist_core::config::StorageConfig;
use repohist_core::error::StateError;
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// Open the store at `db_path` with default storage settings.
pub fn open_connection(db_path: &Path) -> Result<Connection, StateError> {
    open_connection_with(db_path, &StorageConfig::default())
}

/// Open the store at `db_path`, creating missing parent directories, and
/// apply the configured pragmas. WAL keeps readers unblocked while a sync
/// pass writes; foreign keys are off by default in SQLite and the schema
/// relies on them for cascading deletes.
pub fn open_connection_with(
    db_path: &Path,
    storage: &StorageConfig,
) -> Result<Connection, StateError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(StateError::Io)?;
    }

    let conn = Connection::open(db_path).map_err(StateError::sqlite)?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};
         PRAGMA cache_size = {};",
        storage.busy_timeout_ms, storage.cache_size
    ))
    .map_err(StateError::sqlite)?;

    info!(?db_path, "store opened");
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_applies_default_pragmas() {
        let dir = tempdir().unwrap();
        let conn = open_connection(&dir.path().join("test.db")).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");

        let fk: i32 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn open_honors_configured_storage_settings() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            busy_timeout_ms: 1234,
            cache_size: -2000,
            ..StorageConfig::default()
        };
        let conn = open_connection_with(&dir.path().join("test.db"), &storage).unwrap();

        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 1234);

        let cache: i64 = conn
            .query_row("PRAGMA cache_size", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cache, -2000);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested/deeper/test.db");
        open_connection(&db_path).unwrap();
        assert!(db_path.exists());
    }
}
