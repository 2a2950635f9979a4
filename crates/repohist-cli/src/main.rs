mod commands;

use clap::{Parser, Subcommand};
use std::path::Path;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "repohist",
    version,
    about = "Mirror a remote commit history into a local store",
    long_about = "Repohist incrementally ingests a GitHub-hosted commit history into a local\n\
        SQLite store and serves cached root-directory listings from it.\n\n\
        Quick start:\n  \
        repohist init https://github.com/acme/widget\n  \
        repohist fetch https://github.com/acme/widget\n  \
        repohist browse https://github.com/acme/widget"
)]
struct Cli {
    /// Enable verbose logging (set log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (default: .repohist/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a repository for tracking
    ///
    /// Creates the SQLite database under the configured data directory and
    /// records the repository with its remote default branch.
    ///
    /// Example: repohist init https://github.com/acme/widget
    Init {
        /// Repository URL (https://github.com/<owner>/<name>)
        url: String,
    },
    /// Fetch new changesets from the remote history
    ///
    /// Incremental and idempotent: resumes from the stored watermark and
    /// creates only commits not yet in the local store.
    ///
    /// Example: repohist fetch https://github.com/acme/widget
    Fetch {
        /// Repository URL
        url: String,
    },
    /// List the repository root directory
    ///
    /// Served from the fileset cache when possible, otherwise fetched live
    /// (including per-entry last-commit lookups) and cached.
    ///
    /// Example: repohist browse https://github.com/acme/widget --ref main
    Browse {
        /// Repository URL
        url: String,

        /// Branch or revision to list (default: the repository's default branch)
        #[arg(long)]
        r#ref: Option<String>,
    },
    /// Resolve a hash, short hash, or branch-head id to a stored changeset
    ///
    /// Example: repohist resolve https://github.com/acme/widget abcdef0
    Resolve {
        /// Repository URL
        url: String,

        /// Full or short commit hash
        name: String,
    },
    /// Delete every stored changeset and cached listing for a repository
    ///
    /// The repository stays registered; the next fetch rescans from scratch.
    Wipe {
        /// Repository URL
        url: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config_file = cli.config.as_deref().map(Path::new);
    let cwd = std::env::current_dir().ok();
    let config = repohist_core::config::Config::load_with_file(cwd.as_deref(), config_file)?;

    match cli.command {
        Commands::Init { url } => commands::init::run(&config, &url),
        Commands::Fetch { url } => commands::fetch::run(&config, &url),
        Commands::Browse { url, r#ref } => commands::browse::run(&config, &url, r#ref.as_deref()),
        Commands::Resolve { url, name } => commands::resolve::run(&config, &url, &name),
        Commands::Wipe { url } => commands::wipe::run(&config, &url),
    }
}
