//! Re-issue of a request after a credential refresh

use std::sync::Arc;

use common::Secret;
use interceptor::{ApiRequest, InterceptorChain, Pass};
use session::SessionStore;
use tracing::debug;

use crate::error::Result;
use crate::http::{ApiResponse, HttpClient};
use crate::metrics;

/// Sends a request again with a fresh access token.
///
/// The replay carries the new token and the replay marker, skips the
/// credential stage of the chain but still passes tier-gating.
#[derive(Debug, Clone)]
pub struct ReplayDispatcher {
    http: HttpClient,
    chain: InterceptorChain,
    session: Arc<SessionStore>,
}

impl ReplayDispatcher {
    pub fn new(http: HttpClient, chain: InterceptorChain, session: Arc<SessionStore>) -> Self {
        Self {
            http,
            chain,
            session,
        }
    }

    /// Build the replay of `original` carrying `token`.
    pub fn prepare(&self, mut original: ApiRequest, token: &Secret<String>) -> Result<ApiRequest> {
        original.set_bearer(token)?;
        original.mark_replay();
        if let Err(e) = self
            .chain
            .apply(&mut original, &self.session.snapshot(), Pass::Replay)
        {
            metrics::record_policy_rejection();
            return Err(e.into());
        }
        Ok(original)
    }

    pub async fn replay(&self, original: ApiRequest, token: &Secret<String>) -> Result<ApiResponse> {
        let request = self.prepare(original, token)?;
        debug!(request_id = request.id(), path = request.path(), "replaying with refreshed token");
        self.http.transmit(&request).await
    }
}
