//! Client construction settings

use std::time::Duration;

use crate::endpoints::{DEFAULT_BASE_URL, DEFAULT_TIER_GATED, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every request path is appended to.
    pub base_url: String,
    /// Per-request timeout, also applied to the refresh exchange.
    pub timeout: Duration,
    /// Path prefixes that require an active subscription.
    pub tier_gated_paths: Vec<String>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            tier_gated_paths: DEFAULT_TIER_GATED.iter().map(|p| p.to_string()).collect(),
            user_agent: format!("quizprep/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
