//! Single-flight access token refresh
//!
//! States: idle (`in_flight == false`, no waiters) and refreshing. The first
//! caller to see a 401 while idle reads the refresh token and session
//! generation, flips the flag and spawns the exchange. Every caller,
//! including that first one, then waits on its own oneshot receiver in the
//! queue. The exchange task settles the outcome, then clears the flag and
//! drains the queue under one lock acquisition, so no waiter is left behind
//! and none is resolved twice.
//!
//! The exchange runs detached from any caller. A caller that gives up drops
//! only its receiver; the refresh still completes for everyone else.

use std::collections::VecDeque;
use std::sync::Arc;

use common::Secret;
use interceptor::ApiRequest;
use session::{Credentials, RefreshCommit, SessionGeneration, SessionStore};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

use crate::auth;
use crate::endpoints::is_auth_path;
use crate::error::{Error, RefreshError};
use crate::http::HttpClient;
use crate::metrics;

type Outcome = std::result::Result<Secret<String>, RefreshError>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

pub struct RefreshCoordinator {
    session: Arc<SessionStore>,
    http: HttpClient,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(session: Arc<SessionStore>, http: HttpClient) -> Self {
        Self {
            session,
            http,
            state: Mutex::new(RefreshState::default()),
        }
    }

    /// Whether `error` on `request` is recoverable by refreshing.
    ///
    /// Only a 401 on a first attempt to a non-credential endpoint qualifies.
    pub fn should_refresh(request: &ApiRequest, error: &Error) -> bool {
        error.is_unauthenticated() && !request.is_replay() && !is_auth_path(request.path())
    }

    /// Whether an exchange is currently outstanding.
    pub async fn is_refreshing(&self) -> bool {
        self.state.lock().await.in_flight
    }

    /// Obtain an access token newer than `sent_with`, the token the failed
    /// request carried.
    ///
    /// If the session already holds a different token (a refresh landed
    /// after the request was stamped) it is returned without an exchange.
    /// Otherwise the caller joins the in-flight refresh or starts one.
    pub async fn acquire_token(self: &Arc<Self>, sent_with: Option<&str>) -> Outcome {
        let receiver = {
            let mut state = self.state.lock().await;

            if let Some(current) = self.session.access_token()
                && sent_with.is_none_or(|sent| !current.matches(sent))
            {
                debug!("access token already refreshed, reusing it");
                return Ok(current);
            }

            let (sender, receiver) = oneshot::channel();
            if state.in_flight {
                state.waiters.push_back(sender);
                metrics::record_refresh_waiter();
                debug!(waiters = state.waiters.len(), "queued behind in-flight refresh");
            } else {
                let Some((generation, refresh)) = self.session.refresh_credentials() else {
                    return Err(RefreshError::NoRefreshToken);
                };
                state.in_flight = true;
                state.waiters.push_back(sender);
                debug!("starting refresh exchange");

                let coordinator = Arc::clone(self);
                tokio::spawn(async move { coordinator.run_exchange(generation, refresh).await });
            }
            receiver
        };

        receiver.await.unwrap_or(Err(RefreshError::Abandoned))
    }

    async fn run_exchange(&self, generation: SessionGeneration, refresh: Secret<String>) {
        let outcome = self.exchange(generation, refresh).await;
        self.settle(outcome).await;
    }

    /// Clear the in-flight flag and resolve every waiter in arrival order.
    async fn settle(&self, outcome: Outcome) {
        let waiters = {
            let mut state = self.state.lock().await;
            state.in_flight = false;
            std::mem::take(&mut state.waiters)
        };

        let total = waiters.len();
        let mut delivered = 0;
        for waiter in waiters {
            if waiter.send(outcome.clone()).is_ok() {
                delivered += 1;
            }
        }
        debug!(waiters = total, delivered, ok = outcome.is_ok(), "refresh settled");
    }

    async fn exchange(&self, generation: SessionGeneration, refresh: Secret<String>) -> Outcome {
        let response = match auth::refresh_exchange(&self.http, &refresh).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_refresh("failure");
                warn!(error = %e, "refresh exchange failed, ending session");
                match self.session.invalidate(generation).await {
                    Ok(true) => {}
                    Ok(false) => debug!("session already replaced, nothing to invalidate"),
                    Err(e) => warn!(error = %e, "failed to erase persisted session"),
                }
                return Err(e);
            }
        };

        let access = Secret::from(response.access_token);
        let rotated = response.refresh_token.is_some();
        let refresh = response.refresh_token.map(Secret::from).unwrap_or(refresh);

        match self
            .session
            .commit_refresh(generation, Credentials::new(access.clone(), refresh))
            .await
        {
            RefreshCommit::Committed => {
                metrics::record_refresh("success");
                info!(rotated, "access token refreshed");
                Ok(access)
            }
            RefreshCommit::CommittedUnpersisted(e) => {
                metrics::record_refresh("success");
                warn!(error = %e, rotated, "access token refreshed but not persisted");
                Ok(access)
            }
            RefreshCommit::Discarded => {
                metrics::record_refresh("discarded");
                info!("session changed during refresh, discarding new tokens");
                Err(RefreshError::SessionChanged)
            }
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}
