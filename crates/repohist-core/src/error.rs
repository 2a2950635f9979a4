use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("sync error: {0}")]
    Sync(#[from] SyncError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("repository not found: {repository}")]
    RepositoryNotFound { repository: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Convenience constructor for SQLite errors — use with `.map_err(StateError::sqlite)`.
    pub fn sqlite<E: std::fmt::Display>(e: E) -> Self {
        Self::Sqlite(e.to_string())
    }
}

/// A remote call failed. Every variant names the operation (and the
/// identifier it was working on, where there is one) so callers can log
/// something an operator can act on. Not retried at this layer.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("remote call failed: operation={operation}: {detail}")]
    Remote { operation: String, detail: String },

    #[error("not found: operation={operation}, identifier={identifier}")]
    NotFound {
        operation: String,
        identifier: String,
    },

    #[error("unexpected response: operation={operation}: {detail}")]
    UnexpectedResponse { operation: String, detail: String },
}

impl ProviderError {
    pub fn remote(operation: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Self::Remote {
            operation: operation.into(),
            detail: detail.to_string(),
        }
    }

    pub fn not_found(operation: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.into(),
            identifier: identifier.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("file changes incomplete for commit {scmid}: {detail}")]
    IncompleteFileChanges { scmid: String, detail: String },
}

pub type Result<T> = std::result::Result<T, Error>;
