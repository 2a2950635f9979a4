use repohist_core::error::StateError;
use rusqlite::Connection;
use tracing::info;

/// Current schema version. Bump this when adding a new migration step.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Create all required SQLite tables and run any pending migrations.
pub fn create_tables(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(SCHEMA_SQL).map_err(StateError::sqlite)?;
    migrate(conn)?;
    info!("SQLite schema created (version {})", CURRENT_SCHEMA_VERSION);
    Ok(())
}

/// Run incremental schema migrations up to `CURRENT_SCHEMA_VERSION`.
///
/// The `schema_migrations` table tracks which version has been applied.
/// New migrations should be added to the `MIGRATIONS` array below.
pub fn migrate(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(StateError::sqlite)?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(StateError::sqlite)?;

    type MigrationFn = fn(&Connection) -> Result<(), StateError>;

    // migrations[n - 1] upgrades a version-(n-1) store to version n.
    let migrations: &[MigrationFn] = &[
        // V1: the SCHEMA_SQL baseline. Recorded, nothing to run.
        |_conn| Ok(()),
        // V2: composite index for the fileset-cache read path.
        // Idempotent: the index already exists in the base DDL for fresh installs.
        |conn| {
            conn.execute_batch(
                "CREATE INDEX IF NOT EXISTS idx_root_filesets_repo_changeset
                     ON root_filesets(repository_id, changeset_id);",
            )
            .map_err(StateError::sqlite)?;
            Ok(())
        },
    ];

    for version in (current + 1)..=(CURRENT_SCHEMA_VERSION) {
        let idx = (version - 1) as usize;
        if idx < migrations.len() {
            migrations[idx](conn)?;
        }
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(StateError::sqlite)?;
        info!(version, "Applied schema migration");
    }

    Ok(())
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS repositories (
    id INTEGER PRIMARY KEY,
    root_url TEXT NOT NULL UNIQUE,
    default_branch TEXT,
    last_committed_date TEXT,
    last_committed_id TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS changesets (
    id INTEGER PRIMARY KEY,
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    revision TEXT NOT NULL,
    scmid TEXT NOT NULL,
    committer TEXT NOT NULL,
    committed_on TEXT NOT NULL,
    comments TEXT NOT NULL DEFAULT '',
    UNIQUE(repository_id, scmid)
);

CREATE INDEX IF NOT EXISTS idx_changesets_repo_committed
    ON changesets(repository_id, committed_on);

CREATE TABLE IF NOT EXISTS changeset_parents (
    changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
    parent_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    PRIMARY KEY(changeset_id, position)
);

CREATE TABLE IF NOT EXISTS file_changes (
    id INTEGER PRIMARY KEY,
    changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
    action TEXT NOT NULL CHECK (action IN ('A', 'M', 'D')),
    path TEXT NOT NULL,
    from_path TEXT
);

CREATE INDEX IF NOT EXISTS idx_file_changes_changeset
    ON file_changes(changeset_id);

CREATE TABLE IF NOT EXISTS root_filesets (
    id INTEGER PRIMARY KEY,
    repository_id INTEGER NOT NULL REFERENCES repositories(id),
    revision TEXT NOT NULL,
    changeset_id INTEGER NOT NULL REFERENCES changesets(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    path TEXT NOT NULL,
    size INTEGER,
    latest_commit_id TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_root_filesets_repo_changeset
    ON root_filesets(repository_id, changeset_id);
CREATE INDEX IF NOT EXISTS idx_root_filesets_repo_revision
    ON root_filesets(repository_id, revision);
"#;
