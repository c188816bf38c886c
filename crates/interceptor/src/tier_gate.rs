//! Subscription tier-gating
//!
//! Premium-only resources are identified by path prefix. A prefix matches
//! whole path segments: `/mock` gates `/mock` and `/mock/start` but not
//! `/mockery`.

use chrono::Utc;
use session::Session;
use tracing::debug;

use crate::error::{Error, Result};
use crate::request::ApiRequest;
use crate::{RequestInterceptor, Stage};

/// Rejects gated paths unless the session holds an active subscription.
#[derive(Debug, Clone)]
pub struct TierGate {
    prefixes: Vec<String>,
}

impl TierGate {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.into().trim_end_matches('/').to_string())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Whether `path` falls under one of the gated prefixes.
    pub fn is_gated(&self, path: &str) -> bool {
        let path = path.split('?').next().unwrap_or(path);
        self.prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl RequestInterceptor for TierGate {
    fn id(&self) -> &str {
        "tier-gate"
    }

    fn stage(&self) -> Stage {
        Stage::Policy
    }

    fn intercept(&self, request: &mut ApiRequest, session: &Session) -> Result<()> {
        if !self.is_gated(request.path()) || session.has_active_subscription_at(Utc::now()) {
            return Ok(());
        }
        debug!(
            request_id = request.id(),
            path = request.path(),
            "rejecting tier-gated request without active subscription"
        );
        Err(Error::SubscriptionRequired {
            path: request.path().to_string(),
        })
    }
}
