//! Error types for command execution.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("command not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("resolved command is empty")]
    EmptyCommand,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Map a spawn failure to the matching execution error.
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(program.to_string()),
            std::io::ErrorKind::PermissionDenied => Error::PermissionDenied(program.to_string()),
            _ => Error::ExecutionFailed(format!("failed to spawn {}: {}", program, err)),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
