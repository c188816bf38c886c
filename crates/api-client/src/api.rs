//! Typed wrappers for the app's endpoints
//!
//! Request bodies are explicit records. Response shapes are owned by the
//! server and returned as `serde_json::Value`.

use interceptor::ApiRequest;
use serde::Serialize;
use serde_json::Value;

use crate::client::ApiClient;
use crate::endpoints;
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeStart {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Bookmark<'a> {
    question_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct JoinChallenge<'a> {
    code: &'a str,
}

#[derive(Debug, Serialize)]
struct ChallengeScore {
    score: u32,
}

impl ApiClient {
    pub async fn profile(&self) -> Result<Value> {
        self.get_json(endpoints::PROFILE).await
    }

    pub async fn dashboard_summary(&self) -> Result<Value> {
        self.get_json(endpoints::DASHBOARD_SUMMARY).await
    }

    pub async fn start_practice(&self, options: &PracticeStart) -> Result<Value> {
        self.post_json(endpoints::PRACTICE_START, options).await
    }

    /// Question list filtered by `filters` (e.g. `subject`, `topic`).
    pub async fn practice_questions(&self, filters: &[(&str, &str)]) -> Result<Value> {
        let request = filters
            .iter()
            .fold(ApiRequest::get(endpoints::PRACTICE_QUESTIONS), |request, (k, v)| {
                request.query(*k, *v)
            });
        self.execute(request).await?.json()
    }

    pub async fn practice_filters(&self) -> Result<Value> {
        self.get_json(endpoints::PRACTICE_FILTERS).await
    }

    pub async fn bookmark(&self, question_id: &str) -> Result<Value> {
        self.post_json(endpoints::PRACTICE_BOOKMARK, &Bookmark { question_id })
            .await
    }

    pub async fn report_question(&self, question_id: &str, reason: &str) -> Result<Value> {
        self.post_json(&endpoints::question_report(question_id), &Report { reason })
            .await
    }

    /// Premium only.
    pub async fn start_mock(&self) -> Result<Value> {
        self.post_json(endpoints::MOCK_START, &serde_json::json!({}))
            .await
    }

    /// Premium only.
    pub async fn submit_mock(&self, answers: &Value) -> Result<Value> {
        self.post_json(endpoints::MOCK_SUBMIT, answers).await
    }

    pub async fn create_challenge(&self, settings: &Value) -> Result<Value> {
        self.post_json(endpoints::CHALLENGE_CREATE, settings).await
    }

    pub async fn join_challenge(&self, code: &str) -> Result<Value> {
        self.post_json(endpoints::CHALLENGE_JOIN, &JoinChallenge { code })
            .await
    }

    pub async fn challenge(&self, challenge_id: &str) -> Result<Value> {
        self.get_json(&endpoints::challenge(challenge_id)).await
    }

    pub async fn submit_challenge(&self, challenge_id: &str, score: u32) -> Result<Value> {
        self.post_json(
            &endpoints::challenge_submit(challenge_id),
            &ChallengeScore { score },
        )
        .await
    }

    pub async fn create_payment_order(&self, order: &Value) -> Result<Value> {
        self.post_json(endpoints::PAYMENT_CREATE_ORDER, order).await
    }
}
