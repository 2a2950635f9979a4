use super::{open_store, require_repository};
use anyhow::{Context, Result};
use repohist_core::config::Config;
use repohist_provider::github::GithubProvider;
use repohist_sync::coordinator::{self, SyncOptions};

pub fn run(config: &Config, url: &str) -> Result<()> {
    let mut conn = open_store(config)?;
    let repo = require_repository(&conn, url)?;
    let provider = GithubProvider::new(&config.provider, url)?;

    let outcome = coordinator::fetch_changesets_with(
        &mut conn,
        &provider,
        repo.id,
        SyncOptions {
            per_page: config.provider.per_page,
            page_window: config.provider.page_window,
        },
    )
    .context("Fetch failed")?;

    if outcome.fetched == 0 {
        println!("Already current.");
    } else {
        println!(
            "Fetched {} commits, created {} changesets.",
            outcome.fetched, outcome.created
        );
        if let Some(wm) = outcome.watermark {
            println!(
                "Watermark: {} ({})",
                wm.last_committed_id, wm.last_committed_date
            );
        }
    }
    Ok(())
}
