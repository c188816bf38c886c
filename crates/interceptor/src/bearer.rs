//! Bearer credential injection

use session::Session;
use tracing::trace;

use crate::error::Result;
use crate::request::ApiRequest;
use crate::{RequestInterceptor, Stage};

/// Stamps the session's access token onto outgoing requests.
///
/// Leaves the request untouched when the session has no credentials, so a
/// signed-out client sends no `Authorization` header at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerInjector;

impl RequestInterceptor for BearerInjector {
    fn id(&self) -> &str {
        "bearer"
    }

    fn stage(&self) -> Stage {
        Stage::Credential
    }

    fn intercept(&self, request: &mut ApiRequest, session: &Session) -> Result<()> {
        match session.access_token() {
            Some(token) => request.set_bearer(token),
            None => {
                trace!(request_id = request.id(), "no access token, sending unauthenticated");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;
    use session::Credentials;

    #[test]
    fn stamps_current_access_token() {
        let session = Session {
            credentials: Some(Credentials::new("at_live", "rt_live")),
            ..Session::default()
        };
        let mut request = ApiRequest::get("/dashboard/summary");

        BearerInjector.intercept(&mut request, &session).unwrap();

        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer at_live"
        );
    }

    #[test]
    fn signed_out_session_sends_no_header() {
        let mut request = ApiRequest::get("/dashboard/summary");
        BearerInjector
            .intercept(&mut request, &Session::default())
            .unwrap();
        assert!(request.headers().get(AUTHORIZATION).is_none());
    }

    #[test]
    fn id_and_stage() {
        assert_eq!(BearerInjector.id(), "bearer");
        assert_eq!(BearerInjector.stage(), Stage::Credential);
    }
}
