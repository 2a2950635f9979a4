use super::{open_store, require_repository};
use anyhow::{Result, bail};
use repohist_core::config::Config;
use repohist_provider::HistoryProvider;
use repohist_provider::github::GithubProvider;
use repohist_state::repositories;
use tracing::warn;

pub fn run(config: &Config, url: &str) -> Result<()> {
    let conn = open_store(config)?;
    if require_repository(&conn, url).is_ok() {
        bail!("Repository already registered: {url}");
    }

    // Default branch detection is best-effort; an unreachable remote should
    // not block registration.
    let default_branch = match GithubProvider::new(&config.provider, url) {
        Ok(provider) => match provider.default_branch() {
            Ok(branch) => branch,
            Err(e) => {
                warn!(url, error = %e, "could not detect default branch");
                None
            }
        },
        Err(e) => {
            warn!(url, error = %e, "could not reach provider");
            None
        }
    };

    let repo = repositories::create_repository(&conn, url, default_branch.as_deref())?;
    println!(
        "Registered {} (default branch: {})",
        repo.root_url,
        repo.default_branch.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
