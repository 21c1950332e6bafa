//! Error types

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BotError>;

#[derive(Error, Debug)]
pub enum BotError {
    /// Network or transport failure talking to an HTTP API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered, but not with something we can use
    #[error("API error: {0}")]
    Api(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Atomic replace of a state file failed
    #[error("Persist error: {0}")]
    Persist(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl BotError {
    /// Whether the failure is worth retrying on the next cycle
    pub fn is_transient(&self) -> bool {
        matches!(self, BotError::Http(_) | BotError::Api(_) | BotError::Json(_))
    }
}

impl From<tempfile::PersistError> for BotError {
    fn from(e: tempfile::PersistError) -> Self {
        BotError::Persist(e.error.to_string())
    }
}
