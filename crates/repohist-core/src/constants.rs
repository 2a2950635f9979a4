/// Commits requested per page from the remote listing API.
pub const PER_PAGE: u32 = 100;

/// Pages skipped per gallop step when seeking the resume page.
pub const PAGE_WINDOW: u32 = 10;

/// Candidate scmids per existence-check query.
pub const SCMID_CHUNK: usize = 100;

/// Minimum length accepted for a short-hash prefix lookup.
pub const MIN_SHORT_HASH_LEN: usize = 7;

/// Branch names tried, in order, when the provider does not flag a default.
pub const DEFAULT_BRANCH_NAMES: &[&str] = &["main", "master"];

/// Data directory under the user's home, also the global config location.
pub const DEFAULT_DATA_DIR: &str = ".repohist";

/// Per-project config file, relative to the project root.
pub const PROJECT_CONFIG_FILE: &str = ".repohist/config.toml";
