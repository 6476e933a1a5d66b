use thiserror::Error;
use tuide_config::{ConfigError, ResolveError};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("no active file to pick a language from")]
    NoActiveFile,

    #[error("no language associated with {0}")]
    UnknownLanguage(String),

    #[error("no {action} command configured for {language}")]
    MissingCommand { language: String, action: String },

    #[error("unknown macro: {0}")]
    UnknownMacro(String),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] tuide_core::Error),
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;
