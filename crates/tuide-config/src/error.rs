//! Configuration and placeholder resolution errors.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("invalid template trigger {pattern}: {source}")]
    InvalidTrigger {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Placeholder resolution failures. Raised before any process is spawned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unknown placeholder token: %{0}%")]
    UnresolvedToken(String),

    #[error("unresolved config reference: {path}")]
    UnresolvedReference { path: String },

    #[error("config reference {path} is not a scalar value")]
    NotScalar { path: String },

    #[error("resolution cycle at {path} (chain: {})", chain.join(" -> "))]
    Cycle { path: String, chain: Vec<String> },
}

pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
