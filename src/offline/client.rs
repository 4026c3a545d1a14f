//! HTTP client for the Northstar REST API

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::db::goals::{ActionRow, GoalRow, StrategyRow};
use crate::db::letters::LetterRow;
use crate::db::milestones::MilestoneRow;
use crate::db::summaries::SummaryRow;
use crate::db::visions::VisionRow;
use crate::services::{LoginResponse, RegisteredUser};
use crate::types::requests::{
    CreateActionRequest, CreateGoalRequest, CreateLetterRequest, CreateMilestoneRequest,
    CreateStrategyRequest, CreateVisionRequest, LoginRequest, MilestoneInput, RegisterRequest,
    ReplaceMilestonesRequest, StatusUpdate, UpsertSummaryRequest,
};
use crate::types::{NorthstarError, Result, Status};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Server calls the reconciler needs
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_vision(&self, request: &CreateVisionRequest) -> Result<VisionRow>;

    async fn create_goal(&self, request: &CreateGoalRequest) -> Result<GoalRow>;

    async fn set_goal_status(&self, goal_id: &str, status: Status) -> Result<GoalRow>;

    async fn set_strategy_status(&self, strategy_id: &str, status: Status) -> Result<StrategyRow>;

    async fn set_action_status(&self, action_id: &str, status: Status) -> Result<ActionRow>;

    async fn replace_milestones(
        &self,
        goal_id: &str,
        milestones: Vec<MilestoneInput>,
    ) -> Result<GoalRow>;
}

/// HTTP client for a Northstar server
///
/// ```rust,no_run
/// use northstar::offline::HttpClient;
/// use northstar::types::requests::LoginRequest;
///
/// # async fn example() -> northstar::Result<()> {
/// let mut client = HttpClient::new("http://localhost:4000")?;
/// let login = client
///     .login(&LoginRequest {
///         email: Some("ana@example.com".into()),
///         password: Some("correct horse".into()),
///     })
///     .await?;
/// client.set_token(login.token);
/// let goals = client.list_goals().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    client: Client,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            token: None,
        })
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    // ==================== Health & Auth ====================

    /// True when the server answered `{ok: true}`
    pub async fn health(&self) -> Result<bool> {
        let response = self.client.get(self.url("/health")).send().await?;
        let status = response.status();
        let body: serde_json::Value = response.json().await?;
        Ok(status.is_success() && body["ok"] == true)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisteredUser> {
        self.send(self.client.post(self.url("/auth/register")).json(request))
            .await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        self.send(self.client.post(self.url("/auth/login")).json(request))
            .await
    }

    // ==================== Vision ====================

    pub async fn latest_vision(&self) -> Result<Option<VisionRow>> {
        self.send(self.authed(self.client.get(self.url("/vision/latest"))))
            .await
    }

    // ==================== Goals ====================

    pub async fn list_goals(&self) -> Result<Vec<GoalRow>> {
        self.send(self.authed(self.client.get(self.url("/goals"))))
            .await
    }

    pub async fn add_strategy(&self, goal_id: &str, title: &str) -> Result<StrategyRow> {
        let body = CreateStrategyRequest {
            title: Some(title.to_string()),
        };
        self.post(&format!("/goals/{}/strategies", goal_id), &body)
            .await
    }

    pub async fn add_action(&self, strategy_id: &str, description: &str) -> Result<ActionRow> {
        let body = CreateActionRequest {
            description: Some(description.to_string()),
        };
        self.post(&format!("/goals/strategies/{}/actions", strategy_id), &body)
            .await
    }

    pub async fn add_milestone(&self, goal_id: &str, note: &str) -> Result<MilestoneRow> {
        let body = CreateMilestoneRequest {
            note: Some(note.to_string()),
        };
        self.post(&format!("/goals/{}/milestones", goal_id), &body)
            .await
    }

    // ==================== Summaries & Letters ====================

    pub async fn upsert_summary(&self, request: &UpsertSummaryRequest) -> Result<SummaryRow> {
        self.post("/summaries", request).await
    }

    pub async fn get_summary(&self, year: i32, quarter: u8) -> Result<Option<SummaryRow>> {
        let path = format!("/summaries/{}/{}", year, quarter);
        self.send(self.authed(self.client.get(self.url(&path))))
            .await
    }

    pub async fn create_letter(&self, request: &CreateLetterRequest) -> Result<LetterRow> {
        self.post("/letters", request).await
    }

    pub async fn list_letters(&self) -> Result<Vec<LetterRow>> {
        self.send(self.authed(self.client.get(self.url("/letters"))))
            .await
    }

    // ==================== Helper Methods ====================

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {}", token)),
            None => builder,
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.authed(self.client.post(self.url(path))).json(body))
            .await
    }

    async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(self.authed(self.client.patch(self.url(path))).json(body))
            .await
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_error(status, &body));
        }

        Ok(response.json().await?)
    }
}

/// Map an error response to `NorthstarError::Remote`, preferring the
/// server's `error` message over the raw body.
fn remote_error(status: StatusCode, body: &str) -> NorthstarError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.to_string());

    NorthstarError::Remote {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl RemoteApi for HttpClient {
    async fn create_vision(&self, request: &CreateVisionRequest) -> Result<VisionRow> {
        self.post("/vision", request).await
    }

    async fn create_goal(&self, request: &CreateGoalRequest) -> Result<GoalRow> {
        self.post("/goals", request).await
    }

    async fn set_goal_status(&self, goal_id: &str, status: Status) -> Result<GoalRow> {
        self.patch(&format!("/goals/{}/status", goal_id), &StatusUpdate::new(status))
            .await
    }

    async fn set_strategy_status(&self, strategy_id: &str, status: Status) -> Result<StrategyRow> {
        self.patch(
            &format!("/goals/strategies/{}/status", strategy_id),
            &StatusUpdate::new(status),
        )
        .await
    }

    async fn set_action_status(&self, action_id: &str, status: Status) -> Result<ActionRow> {
        self.patch(
            &format!("/goals/actions/{}/status", action_id),
            &StatusUpdate::new(status),
        )
        .await
    }

    async fn replace_milestones(
        &self,
        goal_id: &str,
        milestones: Vec<MilestoneInput>,
    ) -> Result<GoalRow> {
        let body = ReplaceMilestonesRequest {
            milestones: Some(milestones),
        };
        self.patch(&format!("/goals/{}/milestones", goal_id), &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpClient::new("http://localhost:4000/").unwrap();
        assert_eq!(client.url("/goals"), "http://localhost:4000/goals");
        assert!(client.token().is_none());
        assert_eq!(client.with_token("t").token(), Some("t"));
    }

    #[test]
    fn test_remote_error_prefers_message() {
        let err = remote_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"You already have 5 active goals.","code":"QUOTA_EXCEEDED"}"#,
        );
        match err {
            NorthstarError::Remote { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "You already have 5 active goals.");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = remote_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(
            err,
            NorthstarError::Remote { status: 502, ref message } if message == "upstream down"
        ));
    }
}
