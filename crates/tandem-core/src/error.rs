//! Error types for Tandem Core

use thiserror::Error;

/// Result type alias using Tandem Error
pub type Result<T> = std::result::Result<T, Error>;

/// Tandem error types
///
/// Data-quality problems inside the orchestration state never surface here;
/// they degrade to safe defaults and are logged. These variants cover the
/// genuinely fatal cases: a store that cannot be reached, a config file that
/// cannot be parsed, a handler that is wired incorrectly.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Turn superseded by a newer message")]
    Superseded,
}
