//! API paths, relative to the configured base URL

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000/api";

/// Fixed per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Paths reserved for premium subscribers.
pub const DEFAULT_TIER_GATED: &[&str] = &["/mock"];

/// Credential endpoints never take part in token refresh.
pub const AUTH_PREFIX: &str = "/auth";

pub const LOGIN: &str = "/auth/login";
pub const SIGNUP: &str = "/auth/signup";
pub const REFRESH: &str = "/auth/refresh";
pub const LOGOUT: &str = "/auth/logout";

pub const PROFILE: &str = "/user/profile";
pub const DASHBOARD_SUMMARY: &str = "/dashboard/summary";

pub const PRACTICE_START: &str = "/practice/start";
pub const PRACTICE_QUESTIONS: &str = "/practice/questions";
pub const PRACTICE_FILTERS: &str = "/practice/filters";
pub const PRACTICE_BOOKMARK: &str = "/practice/bookmark";

pub const MOCK_START: &str = "/mock/start";
pub const MOCK_SUBMIT: &str = "/mock/submit";

pub const CHALLENGE_CREATE: &str = "/challenges/create";
pub const CHALLENGE_JOIN: &str = "/challenges/join";

pub const PAYMENT_CREATE_ORDER: &str = "/payment/create-order";

/// Whether `path` addresses a credential endpoint.
pub fn is_auth_path(path: &str) -> bool {
    path.strip_prefix(AUTH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

pub fn question_report(question_id: &str) -> String {
    format!("/questions/{question_id}/report")
}

pub fn challenge(challenge_id: &str) -> String {
    format!("/challenges/{challenge_id}")
}

pub fn challenge_submit(challenge_id: &str) -> String {
    format!("/challenges/{challenge_id}/submit")
}
