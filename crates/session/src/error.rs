//! Error types for session persistence

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("storage unavailable: {0}")]
    Storage(String),

    #[error("session record parse error: {0}")]
    Parse(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
