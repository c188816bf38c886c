//! Session record types
//!
//! The access and refresh tokens live together in [`Credentials`] so a
//! session can never hold one without the other.

use chrono::{DateTime, Utc};
use common::Secret;
use serde::{Deserialize, Serialize};

/// The bearer/refresh token pair for a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    access: Secret<String>,
    refresh: Secret<String>,
}

impl Credentials {
    pub fn new(access: impl Into<Secret<String>>, refresh: impl Into<Secret<String>>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    /// Short-lived bearer credential sent on every request.
    pub fn access(&self) -> &Secret<String> {
        &self.access
    }

    /// Long-lived credential exchanged for a new access token.
    pub fn refresh(&self) -> &Secret<String> {
        &self.refresh
    }
}

/// Identity snapshot of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Subscription plan classification.
///
/// The server spells plans inconsistently (`free`/`FREE`, `premium`/`PRO`),
/// so every known spelling is accepted. Serializes lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[serde(alias = "FREE")]
    Free,
    #[serde(alias = "PREMIUM", alias = "PRO", alias = "pro")]
    Premium,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub plan: Plan,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn free() -> Self {
        Self {
            plan: Plan::Free,
            expires_at: None,
        }
    }

    /// Premium with an expiry strictly after `now`. A premium plan without
    /// an expiry is treated as expired.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.plan == Plan::Premium && self.expires_at.is_some_and(|expires| expires > now)
    }

    pub fn is_active(&self) -> bool {
        self.is_active_at(Utc::now())
    }
}

/// In-memory view of the persisted session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub credentials: Option<Credentials>,
    pub user: Option<User>,
    pub subscription: Option<Subscription>,
}

impl Session {
    pub fn access_token(&self) -> Option<&Secret<String>> {
        self.credentials.as_ref().map(Credentials::access)
    }

    pub fn refresh_token(&self) -> Option<&Secret<String>> {
        self.credentials.as_ref().map(Credentials::refresh)
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Whether tier-gated resources are reachable at `now`.
    pub fn has_active_subscription_at(&self, now: DateTime<Utc>) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|subscription| subscription.is_active_at(now))
    }
}
