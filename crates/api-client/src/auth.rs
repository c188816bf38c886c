//! Credential endpoint records and the refresh exchange
//!
//! Login and signup return the full session; refresh returns a new access
//! token and, when the server rotates it, a new refresh token.

use common::Secret;
use interceptor::ApiRequest;
use serde::{Deserialize, Serialize};
use session::{Subscription, User};

use crate::endpoints;
use crate::error::{Error, RefreshError};
use crate::http::HttpClient;

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SignupRequest<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub phone: &'a str,
    pub password: &'a str,
}

/// Body of a successful login or signup.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub subscription: Option<Subscription>,
}

impl std::fmt::Debug for AuthResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthResponse")
            .field("user", &self.user)
            .field("subscription", &self.subscription)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Exchange `refresh` for a new access token.
///
/// Goes straight to the HTTP core: the exchange is never intercepted and
/// can never itself trigger a refresh.
pub async fn refresh_exchange(
    http: &HttpClient,
    refresh: &Secret<String>,
) -> std::result::Result<RefreshResponse, RefreshError> {
    let request = ApiRequest::post(endpoints::REFRESH)
        .json(&RefreshRequest {
            refresh_token: refresh.expose(),
        })
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

    let response = http.transmit(&request).await.map_err(|e| match e {
        Error::Api { status, message } => RefreshError::Rejected { status, message },
        Error::Timeout => RefreshError::Timeout,
        other => RefreshError::Transport(other.to_string()),
    })?;

    let body: RefreshResponse = response
        .json()
        .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;
    if body.access_token.is_empty() {
        return Err(RefreshError::InvalidResponse("empty accessToken".into()));
    }
    Ok(body)
}
