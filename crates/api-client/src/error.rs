//! Error types for API calls

/// Errors returned by `ApiClient`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Rejected by the interceptor chain before reaching the network.
    #[error("request rejected before sending: {0}")]
    Policy(#[from] interceptor::Error),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("token refresh failed: {0}")]
    Refresh(#[from] RefreshError),

    #[error("session storage error: {0}")]
    Session(#[from] session::Error),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status of an API error response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::Refresh(RefreshError::Rejected { status, .. }) => Some(*status),
            _ => None,
        }
    }

    /// Expired or invalid access token.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Error::Api { status: 401, .. })
    }

    pub fn is_subscription_required(&self) -> bool {
        matches!(
            self,
            Error::Policy(interceptor::Error::SubscriptionRequired { .. })
        )
    }

    /// Whether the session was ended by this failure.
    pub fn ended_session(&self) -> bool {
        matches!(self, Error::Refresh(e) if e.ends_session())
    }
}

/// Outcome of a failed refresh exchange, delivered to every waiting caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh token rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("refresh exchange timed out")]
    Timeout,

    #[error("refresh exchange failed: {0}")]
    Transport(String),

    #[error("invalid refresh response: {0}")]
    InvalidResponse(String),

    #[error("no refresh token in session")]
    NoRefreshToken,

    #[error("session changed while refreshing")]
    SessionChanged,

    #[error("refresh ended without a result")]
    Abandoned,
}

impl RefreshError {
    /// Failures of the exchange itself; these invalidate the session.
    pub fn ends_session(&self) -> bool {
        matches!(
            self,
            RefreshError::Rejected { .. }
                | RefreshError::Timeout
                | RefreshError::Transport(_)
                | RefreshError::InvalidResponse(_)
        )
    }
}

/// Result alias for API operations.
pub type Result<T> = std::result::Result<T, Error>;
