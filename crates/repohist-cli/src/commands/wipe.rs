use super::{open_store, require_repository};
use anyhow::Result;
use repohist_core::config::Config;
use repohist_state::changesets;

pub fn run(config: &Config, url: &str) -> Result<()> {
    let mut conn = open_store(config)?;
    let repo = require_repository(&conn, url)?;

    let count = changesets::changeset_count(&conn, repo.id)?;
    changesets::clear_repository(&mut conn, repo.id)?;
    println!("Wiped {count} changesets for {url}.");
    Ok(())
}
