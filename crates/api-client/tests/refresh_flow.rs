//! End-to-end token refresh behavior against an in-process mock API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use api_client::{ApiClient, ClientConfig, Error, RefreshError};
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use chrono::Utc;
use common::Secret;
use futures_util::future::join_all;
use interceptor::ApiRequest;
use serde_json::{Value, json};
use session::{
    Credentials, FileStore, KeyValueStore, MemoryStore, Plan, SessionStore, Subscription, User,
};
use tokio::net::TcpListener;

/// Mock quizprep API. Protected routes accept only the most recently issued
/// access token.
#[derive(Default)]
struct MockApi {
    valid_access: Mutex<Option<String>>,
    valid_refresh: Mutex<String>,
    issued: AtomicUsize,
    refresh_calls: AtomicUsize,
    refresh_delay: Mutex<Duration>,
    reject_refresh: AtomicBool,
    rotate_refresh: AtomicBool,
    mock_calls: AtomicUsize,
    seen_auth: Mutex<Vec<Option<String>>>,
}

impl MockApi {
    fn new() -> Arc<Self> {
        let mock = MockApi::default();
        *mock.valid_refresh.lock().unwrap() = "rt_0".into();
        Arc::new(mock)
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn last_auth(&self) -> Option<String> {
        self.seen_auth.lock().unwrap().last().cloned().flatten()
    }

    /// Record the Authorization header and check it against the live token.
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        self.seen_auth.lock().unwrap().push(auth.clone());

        let valid = self.valid_access.lock().unwrap().clone();
        match (auth, valid) {
            (Some(auth), Some(valid)) if auth == format!("Bearer {valid}") => Ok(()),
            _ => Err(unauthorized("Token expired")),
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "message": message }))).into_response()
}

async fn login(State(mock): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    if body["password"] != "correct-horse" {
        return unauthorized("Invalid credentials");
    }
    *mock.valid_access.lock().unwrap() = Some("at_0".into());
    *mock.valid_refresh.lock().unwrap() = "rt_0".into();
    Json(json!({
        "user": { "id": "u1", "name": "Asha", "email": body["email"] },
        "accessToken": "at_0",
        "refreshToken": "rt_0",
        "subscription": { "plan": "premium", "expiresAt": "2099-01-01T00:00:00Z" }
    }))
    .into_response()
}

async fn refresh(State(mock): State<Arc<MockApi>>, Json(body): Json<Value>) -> Response {
    mock.refresh_calls.fetch_add(1, Ordering::SeqCst);
    let delay = *mock.refresh_delay.lock().unwrap();
    tokio::time::sleep(delay).await;

    let expected = mock.valid_refresh.lock().unwrap().clone();
    if mock.reject_refresh.load(Ordering::SeqCst) || body["refreshToken"] != expected.as_str() {
        return unauthorized("Invalid refresh token");
    }

    let n = mock.issued.fetch_add(1, Ordering::SeqCst) + 1;
    let access = format!("at_{n}");
    *mock.valid_access.lock().unwrap() = Some(access.clone());
    if mock.rotate_refresh.load(Ordering::SeqCst) {
        let rotated = format!("rt_{n}");
        *mock.valid_refresh.lock().unwrap() = rotated.clone();
        Json(json!({ "accessToken": access, "refreshToken": rotated })).into_response()
    } else {
        Json(json!({ "accessToken": access })).into_response()
    }
}

async fn logout() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn profile(State(mock): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    if let Err(denied) = mock.authorize(&headers) {
        return denied;
    }
    Json(json!({ "id": "u1", "name": "Asha" })).into_response()
}

async fn mock_start(State(mock): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    mock.mock_calls.fetch_add(1, Ordering::SeqCst);
    if let Err(denied) = mock.authorize(&headers) {
        return denied;
    }
    Json(json!({ "testId": "m1" })).into_response()
}

/// Always rejects, whatever token is presented.
async fn locked(State(mock): State<Arc<MockApi>>, headers: HeaderMap) -> Response {
    let _ = mock.authorize(&headers);
    unauthorized("Account locked")
}

async fn broken() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "boom" })),
    )
        .into_response()
}

/// Start the mock API and return its base URL.
async fn start_mock_api(mock: Arc<MockApi>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
        .route("/api/user/profile", get(profile))
        .route("/api/user/locked", get(locked))
        .route("/api/user/broken", get(broken))
        .route("/api/mock/start", post(mock_start))
        .with_state(mock);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn user() -> User {
    User {
        id: "u1".into(),
        name: "Asha".into(),
    }
}

fn premium() -> Subscription {
    Subscription {
        plan: Plan::Premium,
        expires_at: Some(Utc::now() + chrono::Duration::days(30)),
    }
}

/// Client whose session holds an access token the mock no longer accepts.
async fn expired_session_client(mock: &Arc<MockApi>) -> (ApiClient, Arc<MemoryStore>) {
    let base_url = start_mock_api(mock.clone()).await;
    let storage = Arc::new(MemoryStore::new());
    let store = Arc::new(SessionStore::new(storage.clone()));
    store.hydrate().await.unwrap();
    store
        .set_session(Credentials::new("at_expired", "rt_0"), user(), premium())
        .await
        .unwrap();
    let client = ApiClient::new(ClientConfig::new(base_url), store).unwrap();
    (client, storage)
}

#[tokio::test]
async fn login_populates_session_that_survives_restart() {
    let mock = MockApi::new();
    let base_url = start_mock_api(mock.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    let store = Arc::new(SessionStore::new(Arc::new(FileStore::new(path.clone()))));
    store.hydrate().await.unwrap();
    let client = ApiClient::new(ClientConfig::new(base_url), store).unwrap();

    let signed_in = client
        .login("asha@example.test", &Secret::from("correct-horse"))
        .await
        .unwrap();
    assert_eq!(signed_in.name, "Asha");

    let restarted = SessionStore::new(Arc::new(FileStore::new(path)));
    assert!(!restarted.is_hydrated());
    restarted.hydrate().await.unwrap();
    assert!(restarted.is_hydrated());

    let session = restarted.snapshot();
    assert_eq!(session.access_token().unwrap().expose(), "at_0");
    assert_eq!(session.refresh_token().unwrap().expose(), "rt_0");
    assert_eq!(session.user, Some(user()));
    assert!(session.has_active_subscription_at(Utc::now()));
}

#[tokio::test]
async fn bad_login_is_a_plain_401_without_refresh() {
    let mock = MockApi::new();
    let (client, _) = expired_session_client(&mock).await;

    let err = client
        .login("asha@example.test", &Secret::from("wrong"))
        .await
        .unwrap_err();

    assert!(err.is_unauthenticated(), "got: {err}");
    assert!(err.to_string().contains("Invalid credentials"), "got: {err}");
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test]
async fn expired_token_is_refreshed_and_request_replayed() {
    let mock = MockApi::new();
    let (client, storage) = expired_session_client(&mock).await;

    let profile = client.profile().await.unwrap();

    assert_eq!(profile["name"], "Asha");
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.last_auth().as_deref(), Some("Bearer at_1"));
    assert_eq!(
        client.session().access_token().unwrap().expose(),
        "at_1"
    );

    let persisted = storage.entries().await;
    assert_eq!(persisted["accessToken"], "at_1");
    assert_eq!(persisted["refreshToken"], "rt_0", "unrotated refresh token is kept");
}

#[tokio::test]
async fn rotated_refresh_token_is_persisted() {
    let mock = MockApi::new();
    mock.rotate_refresh.store(true, Ordering::SeqCst);
    let (client, storage) = expired_session_client(&mock).await;

    client.profile().await.unwrap();

    let session = client.session().snapshot();
    assert_eq!(session.refresh_token().unwrap().expose(), "rt_1");
    assert_eq!(storage.entries().await["refreshToken"], "rt_1");
}

#[tokio::test]
async fn concurrent_expired_requests_share_one_refresh() {
    let mock = MockApi::new();
    *mock.refresh_delay.lock().unwrap() = Duration::from_millis(200);
    let (client, _) = expired_session_client(&mock).await;

    let results = join_all((0..5).map(|_| client.profile())).await;

    assert_eq!(results.len(), 5);
    for result in &results {
        assert_eq!(result.as_ref().unwrap()["id"], "u1");
    }
    assert_eq!(mock.refresh_calls(), 1, "exactly one refresh exchange");
    assert!(!client.coordinator().is_refreshing().await);

    let seen = mock.seen_auth.lock().unwrap().clone();
    let replays = seen
        .iter()
        .filter(|auth| auth.as_deref() == Some("Bearer at_1"))
        .count();
    assert_eq!(replays, 5, "every request replayed with the single new token");
}

#[tokio::test]
async fn rejected_refresh_fails_every_waiter_and_clears_session() {
    let mock = MockApi::new();
    mock.reject_refresh.store(true, Ordering::SeqCst);
    *mock.refresh_delay.lock().unwrap() = Duration::from_millis(100);
    let (client, storage) = expired_session_client(&mock).await;

    let results = join_all((0..3).map(|_| client.profile())).await;

    for result in results {
        let err = result.unwrap_err();
        assert!(
            matches!(
                err,
                Error::Refresh(RefreshError::Rejected { status: 401, .. })
            ),
            "got: {err}"
        );
        assert!(err.ended_session());
    }
    assert_eq!(mock.refresh_calls(), 1);
    assert!(!client.session().snapshot().is_authenticated());
    assert!(storage.entries().await.is_empty(), "no credential left in storage");

    // The next protected request goes out with no Authorization header
    let err = client.profile().await.unwrap_err();
    assert!(err.is_unauthenticated(), "got: {err}");
    assert_eq!(mock.last_auth(), None);
    assert_eq!(mock.refresh_calls(), 1, "signed-out 401 does not refresh");
}

#[tokio::test]
async fn refresh_timeout_fails_every_waiter_and_clears_session() {
    let mock = MockApi::new();
    *mock.refresh_delay.lock().unwrap() = Duration::from_secs(5);
    let base_url = start_mock_api(mock.clone()).await;
    let storage = Arc::new(MemoryStore::new());
    let store = Arc::new(SessionStore::new(storage.clone()));
    store.hydrate().await.unwrap();
    store
        .set_session(Credentials::new("at_expired", "rt_0"), user(), premium())
        .await
        .unwrap();
    let config = ClientConfig {
        timeout: Duration::from_millis(300),
        ..ClientConfig::new(base_url)
    };
    let client = ApiClient::new(config, store).unwrap();

    let results = join_all((0..4).map(|_| client.profile())).await;

    for result in results {
        let err = result.unwrap_err();
        assert!(
            matches!(err, Error::Refresh(RefreshError::Timeout)),
            "got: {err}"
        );
        assert!(err.ended_session());
    }
    assert_eq!(mock.refresh_calls(), 1);
    assert!(!client.session().snapshot().is_authenticated());
    assert!(storage.entries().await.is_empty());
    assert!(!client.coordinator().is_refreshing().await);
}

#[tokio::test]
async fn expired_subscription_is_rejected_before_the_network() {
    let mock = MockApi::new();
    let base_url = start_mock_api(mock.clone()).await;
    let store = Arc::new(SessionStore::new(Arc::new(MemoryStore::new())));
    store.hydrate().await.unwrap();
    store
        .set_session(
            Credentials::new("at_0", "rt_0"),
            user(),
            Subscription {
                plan: Plan::Premium,
                expires_at: Some(Utc::now() - chrono::Duration::days(1)),
            },
        )
        .await
        .unwrap();
    let client = ApiClient::new(ClientConfig::new(base_url), store).unwrap();

    let err = client.start_mock().await.unwrap_err();

    assert!(err.is_subscription_required(), "got: {err}");
    assert_eq!(mock.mock_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn replay_that_fails_again_does_not_refresh_twice() {
    let mock = MockApi::new();
    let (client, _) = expired_session_client(&mock).await;

    let err = client
        .execute(ApiRequest::get("/user/locked"))
        .await
        .unwrap_err();

    assert!(err.is_unauthenticated(), "got: {err}");
    assert!(err.to_string().contains("Account locked"), "got: {err}");
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(mock.last_auth().as_deref(), Some("Bearer at_1"));
}

#[tokio::test]
async fn other_failures_pass_through_untouched() {
    let mock = MockApi::new();
    let (client, _) = expired_session_client(&mock).await;

    let err = client
        .execute(ApiRequest::get("/user/broken"))
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "boom");
        }
        other => panic!("expected API error, got: {other}"),
    }
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test]
async fn logout_during_refresh_discards_refreshed_tokens() {
    let mock = MockApi::new();
    *mock.refresh_delay.lock().unwrap() = Duration::from_millis(300);
    let (client, storage) = expired_session_client(&mock).await;

    let (result, ()) = tokio::join!(client.profile(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        client.session().clear().await.unwrap();
    });

    let err = result.unwrap_err();
    assert!(
        matches!(err, Error::Refresh(RefreshError::SessionChanged)),
        "got: {err}"
    );
    assert!(!client.session().snapshot().is_authenticated());
    assert!(storage.entries().await.is_empty());
    assert!(
        storage.multi_get(&["accessToken"]).await.unwrap()[0].is_none(),
        "refreshed token must not be written after logout"
    );
}

#[tokio::test]
async fn abandoned_waiter_does_not_stall_the_others() {
    let mock = MockApi::new();
    *mock.refresh_delay.lock().unwrap() = Duration::from_millis(200);
    let (client, _) = expired_session_client(&mock).await;

    let (abandoned, completed) = tokio::join!(
        tokio::time::timeout(Duration::from_millis(50), client.profile()),
        client.profile(),
    );

    assert!(abandoned.is_err(), "first caller gave up while queued");
    assert_eq!(completed.unwrap()["name"], "Asha");
    assert_eq!(mock.refresh_calls(), 1);
    assert!(!client.coordinator().is_refreshing().await);
}

#[tokio::test]
async fn logout_clears_session_even_when_server_call_fails() {
    let store = Arc::new(SessionStore::new(Arc::new(MemoryStore::new())));
    store.hydrate().await.unwrap();
    store
        .set_session(Credentials::new("at_0", "rt_0"), user(), premium())
        .await
        .unwrap();
    // Nothing listens here, so the server-side logout fails
    let client = ApiClient::new(ClientConfig::new("http://127.0.0.1:9/api"), store).unwrap();

    client.logout().await.unwrap();

    assert!(!client.session().snapshot().is_authenticated());
    let restarted = client.session();
    restarted.hydrate().await.unwrap();
    assert!(!restarted.snapshot().is_authenticated());
}
