//! Authenticated client for the quizprep REST API
//!
//! Request path:
//! 1. `InterceptorChain` stamps the bearer token and enforces tier-gating
//! 2. `HttpClient` transmits against the configured base URL
//! 3. A 401 on a first attempt goes to the `RefreshCoordinator`, which runs
//!    at most one refresh exchange at a time and queues everyone else
//! 4. `ReplayDispatcher` re-issues the request once with the new token
//!
//! Every other failure is returned to the caller unchanged.

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod metrics;
pub mod refresh;
pub mod replay;

pub use auth::{AuthResponse, LoginRequest, RefreshRequest, RefreshResponse, SignupRequest};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{Error, RefreshError, Result};
pub use http::{ApiResponse, HttpClient};
pub use refresh::RefreshCoordinator;
pub use replay::ReplayDispatcher;
