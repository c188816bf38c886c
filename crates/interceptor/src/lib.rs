//! Request interceptor chain
//!
//! Every outgoing request passes through an ordered chain before it is
//! transmitted. Interceptors read a session snapshot (never the network)
//! and either adjust the request or reject it:
//!
//! - `BearerInjector` (credential stage) stamps `Authorization: Bearer <access>`
//! - `TierGate` (policy stage) rejects tier-gated paths without an active
//!   subscription
//!
//! Interceptors run in registration order. A replayed request already
//! carries a fresh credential, so only policy-stage interceptors run on it.

pub mod bearer;
pub mod error;
pub mod request;
pub mod tier_gate;

pub use bearer::BearerInjector;
pub use error::{Error, Result};
pub use request::ApiRequest;
pub use tier_gate::TierGate;

use session::Session;
use std::sync::Arc;
use tracing::trace;

/// Which part of request preparation an interceptor belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Attaches credentials. Skipped for replays.
    Credential,
    /// Enforces access policy. Runs for every attempt.
    Policy,
}

/// Whether a request is on its first attempt or being re-issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Initial,
    Replay,
}

/// A single step of outgoing request preparation.
///
/// Must not mutate the session and must not perform I/O.
pub trait RequestInterceptor: Send + Sync {
    /// Identifier for logging (e.g. "bearer", "tier-gate")
    fn id(&self) -> &str;

    fn stage(&self) -> Stage;

    /// Adjust `request` or reject it before transmission.
    fn intercept(&self, request: &mut ApiRequest, session: &Session) -> Result<()>;
}

/// Ordered list of interceptors applied to each request.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credential injection followed by tier-gating on `gated_paths`.
    pub fn standard<I, S>(gated_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new()
            .with(BearerInjector)
            .with(TierGate::new(gated_paths))
    }

    /// Append an interceptor; it runs after every one already registered.
    pub fn with(mut self, interceptor: impl RequestInterceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run the chain in registration order, stopping at the first rejection.
    pub fn apply(&self, request: &mut ApiRequest, session: &Session, pass: Pass) -> Result<()> {
        for interceptor in &self.interceptors {
            if pass == Pass::Replay && interceptor.stage() == Stage::Credential {
                continue;
            }
            trace!(interceptor = interceptor.id(), request_id = request.id(), "intercepting");
            interceptor.intercept(request, session)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<&str> = self.interceptors.iter().map(|i| i.id()).collect();
        f.debug_struct("InterceptorChain")
            .field("interceptors", &ids)
            .finish()
    }
}
