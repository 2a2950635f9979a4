pub mod browse;
pub mod fetch;
pub mod init;
pub mod resolve;
pub mod wipe;

use anyhow::{Context, Result};
use repohist_core::config::Config;
use repohist_core::types::RepositoryRecord;
use repohist_state::{db, repositories, schema};
use rusqlite::Connection;

/// Open the store with configured pragmas and make sure the schema exists.
pub fn open_store(config: &Config) -> Result<Connection> {
    let conn = db::open_connection_with(&config.db_path(), &config.storage)
        .context("Failed to open local store")?;
    schema::create_tables(&conn)?;
    Ok(conn)
}

/// Look up a registered repository or fail with a hint.
pub fn require_repository(conn: &Connection, url: &str) -> Result<RepositoryRecord> {
    repositories::find_by_url(conn, url)?
        .ok_or_else(|| anyhow::anyhow!("Repository not registered. Run `repohist init {url}` first."))
}
