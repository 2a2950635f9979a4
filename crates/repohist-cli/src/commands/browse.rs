use super::{open_store, require_repository};
use anyhow::{Result, bail};
use repohist_core::config::Config;
use repohist_provider::github::GithubProvider;
use repohist_sync::dircache;

pub fn run(config: &Config, url: &str, r#ref: Option<&str>) -> Result<()> {
    let mut conn = open_store(config)?;
    let repo = require_repository(&conn, url)?;
    let provider = GithubProvider::new(&config.provider, url)?;

    let r#ref = match r#ref.or(repo.default_branch.as_deref()) {
        Some(r) => r.to_string(),
        None => bail!("No ref given and no default branch known; pass --ref"),
    };

    let entries = dircache::list_root(&mut conn, &provider, &repo, &r#ref)?;
    if entries.is_empty() {
        println!("(empty)");
        return Ok(());
    }
    for entry in entries {
        let size = entry
            .size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        let last = entry.last_commit_id.as_deref().unwrap_or("-");
        let short = &last[..last.len().min(10)];
        println!(
            "{:<4} {:>10}  {:<10}  {}",
            entry.kind, size, short, entry.path
        );
    }
    Ok(())
}
