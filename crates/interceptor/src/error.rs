//! Errors raised while preparing an outgoing request

/// Errors from the request interceptor chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Tier-gated resource requested without an active subscription.
    /// Raised locally; the request never reaches the network.
    #[error("subscription required for {path}")]
    SubscriptionRequired { path: String },

    #[error("invalid header value: {0}")]
    InvalidHeader(String),

    #[error("invalid request body: {0}")]
    InvalidBody(String),
}

/// Result alias for interceptor operations.
pub type Result<T> = std::result::Result<T, Error>;
