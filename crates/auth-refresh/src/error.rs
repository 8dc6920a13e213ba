//! Errors surfaced to callers of the dispatcher

/// Everything `RequestDispatcher::execute` can fail with.
///
/// Auth-path decisions stay inside the gate and coordinator; callers only
/// ever see the terminal `AuthExpired`, never an intermediate 401.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no network connectivity")]
    NetworkUnavailable,

    #[error("session expired, log in again")]
    AuthExpired,

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] transport::TransportError),

    #[error("session storage error: {0}")]
    Storage(#[from] session_store::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Status code for `Http` errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, Error>;
