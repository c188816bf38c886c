//! Authenticated API client
//!
//! `ApiClient` owns the interceptor chain, the HTTP core, its refresh
//! coordinator and the replay dispatcher. Construct one per session store;
//! coordinators are never shared between clients.

use std::sync::Arc;

use common::Secret;
use interceptor::{ApiRequest, InterceptorChain, Pass};
use serde::Serialize;
use serde::de::DeserializeOwned;
use session::{Credentials, SessionStore, Subscription, User};
use tracing::{debug, info, instrument, warn};

use crate::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::config::ClientConfig;
use crate::endpoints;
use crate::error::{RefreshError, Result};
use crate::http::{ApiResponse, HttpClient};
use crate::metrics;
use crate::refresh::RefreshCoordinator;
use crate::replay::ReplayDispatcher;

#[derive(Debug)]
pub struct ApiClient {
    session: Arc<SessionStore>,
    http: HttpClient,
    chain: InterceptorChain,
    coordinator: Arc<RefreshCoordinator>,
    replay: ReplayDispatcher,
}

impl ApiClient {
    /// Client with the standard chain: bearer injection, then tier-gating on
    /// `config.tier_gated_paths`.
    pub fn new(config: ClientConfig, session: Arc<SessionStore>) -> Result<Self> {
        let chain = InterceptorChain::standard(config.tier_gated_paths.iter().cloned());
        Self::with_chain(config, session, chain)
    }

    pub fn with_chain(
        config: ClientConfig,
        session: Arc<SessionStore>,
        chain: InterceptorChain,
    ) -> Result<Self> {
        let http = HttpClient::new(&config)?;
        let coordinator = Arc::new(RefreshCoordinator::new(session.clone(), http.clone()));
        let replay = ReplayDispatcher::new(http.clone(), chain.clone(), session.clone());
        info!(base_url = http.base_url(), interceptors = chain.len(), "API client ready");
        Ok(Self {
            session,
            http,
            chain,
            coordinator,
            replay,
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Send `request` through the chain, refreshing and replaying once on an
    /// expired access token.
    #[instrument(skip_all, fields(request_id = %request.id(), method = %request.method(), path = %request.path()))]
    pub async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        if !self.session.is_hydrated() {
            debug!("session not hydrated yet, request may go out unauthenticated");
        }
        if let Err(e) = self
            .chain
            .apply(&mut request, &self.session.snapshot(), Pass::Initial)
        {
            metrics::record_policy_rejection();
            return Err(e.into());
        }

        let error = match self.http.transmit(&request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };
        if !RefreshCoordinator::should_refresh(&request, &error) {
            return Err(error);
        }

        let sent_with = request.bearer_token().map(str::to_owned);
        let token = match self.coordinator.acquire_token(sent_with.as_deref()).await {
            Ok(token) => token,
            Err(RefreshError::NoRefreshToken) => {
                debug!("401 without a session to refresh");
                return Err(error);
            }
            Err(e) => return Err(e.into()),
        };

        self.replay.replay(request, &token).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = ApiRequest::post(path).json(body)?;
        self.execute(request).await?.json()
    }

    /// Sign in and replace the session with the returned one.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<User> {
        let request = ApiRequest::post(endpoints::LOGIN).json(&LoginRequest {
            email,
            password: password.expose(),
        })?;
        let auth: AuthResponse = self.execute(request).await?.json()?;
        self.establish(auth).await
    }

    /// Create an account and sign in with it.
    pub async fn signup(
        &self,
        name: &str,
        email: &str,
        phone: &str,
        password: &Secret<String>,
    ) -> Result<User> {
        let request = ApiRequest::post(endpoints::SIGNUP).json(&SignupRequest {
            name,
            email,
            phone,
            password: password.expose(),
        })?;
        let auth: AuthResponse = self.execute(request).await?.json()?;
        self.establish(auth).await
    }

    /// Tell the server (best effort), then erase the local session regardless.
    pub async fn logout(&self) -> Result<()> {
        if self.session.snapshot().is_authenticated()
            && let Err(e) = self.execute(ApiRequest::post(endpoints::LOGOUT)).await
        {
            warn!(error = %e, "server-side logout failed, clearing local session anyway");
        }
        self.session.clear().await?;
        info!("signed out");
        Ok(())
    }

    async fn establish(&self, auth: AuthResponse) -> Result<User> {
        let AuthResponse {
            user,
            access_token,
            refresh_token,
            subscription,
        } = auth;
        self.session
            .set_session(
                Credentials::new(access_token, refresh_token),
                user.clone(),
                subscription.unwrap_or_else(Subscription::free),
            )
            .await?;
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }
}
