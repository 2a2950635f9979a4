use super::{open_store, require_repository};
use anyhow::Result;
use repohist_core::config::Config;
use repohist_state::changesets;
use repohist_sync::resolver;

pub fn run(config: &Config, url: &str, name: &str) -> Result<()> {
    let conn = open_store(config)?;
    let repo = require_repository(&conn, url)?;

    match resolver::resolve(&conn, repo.id, name)? {
        Some(cs) => {
            println!("{}", cs.scmid);
            println!("committer:    {}", cs.committer);
            println!("committed on: {}", cs.committed_on);
            let parents = changesets::parents_of(&conn, cs.id)?;
            if !parents.is_empty() {
                let scmids: Vec<String> = parents
                    .iter()
                    .filter_map(|id| changesets::find_by_id(&conn, *id).transpose())
                    .map(|r| r.map(|cs| cs.scmid))
                    .collect::<Result<_, _>>()?;
                println!("parents:      {}", scmids.join(", "));
            }
            if !cs.comments.is_empty() {
                println!("\n{}", cs.comments);
            }
        }
        None => println!("No stored changeset matches `{name}`."),
    }
    Ok(())
}
