//! HTTP client core
//!
//! Transmits a prepared `ApiRequest` against the configured base URL. A
//! non-2xx response becomes `Error::Api` with the server's `message` field
//! when the body carries one. No retries happen at this layer.

use bytes::Bytes;
use interceptor::ApiRequest;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::metrics;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Decode(e.to_string()))
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Transport(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send `request` once and return the response or the classified failure.
    pub async fn transmit(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = endpoint_url(&self.base_url, request)?;

        let mut builder = self
            .client
            .request(request.method().clone(), url)
            .headers(request.headers().clone())
            .header(REQUEST_ID_HEADER, request.id());
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                metrics::record_request("timeout");
                warn!(request_id = request.id(), path = request.path(), "request timed out");
                return Err(Error::Timeout);
            }
            Err(e) => {
                metrics::record_request("transport");
                warn!(request_id = request.id(), path = request.path(), error = %e, "request failed");
                return Err(Error::Transport(e.to_string()));
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(Error::Timeout),
            Err(e) => return Err(Error::Transport(format!("reading response body: {e}"))),
        };

        metrics::record_request(status.as_str());
        debug!(
            request_id = request.id(),
            status = status.as_u16(),
            replay = request.is_replay(),
            "response received"
        );

        if !status.is_success() {
            return Err(Error::Api {
                status: status.as_u16(),
                message: error_message(status, &body),
            });
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Absolute URL for `request`: base URL + path, with the query appended.
fn endpoint_url(base_url: &str, request: &ApiRequest) -> Result<Url> {
    let raw = format!("{base_url}{}", request.path());
    let mut url =
        Url::parse(&raw).map_err(|e| Error::Transport(format!("invalid URL {raw}: {e}")))?;
    if !request.query_pairs().is_empty() {
        url.query_pairs_mut().extend_pairs(request.query_pairs());
    }
    Ok(url)
}

/// Prefer the API's `{"message": ...}` field, then the raw body, then the
/// status reason.
fn error_message(status: StatusCode, body: &[u8]) -> String {
    let from_json = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(str::to_owned));
    if let Some(message) = from_json {
        return message;
    }

    let text = String::from_utf8_lossy(body).trim().to_string();
    if !text.is_empty() {
        return text;
    }
    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
