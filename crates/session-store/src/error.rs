//! Error types for session storage operations

/// Errors from credential storage and token payload parsing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("missing access token: {0}")]
    MissingToken(String),
}

/// Result alias for session storage operations.
pub type Result<T> = std::result::Result<T, Error>;
