use engine::planning::error_message_from_body;
use serde_json::Value;
use shared::{PlanRequest, PlanResponse};
use thiserror::Error;

pub const DEFAULT_API_ROOT: &str = "http://127.0.0.1:8000/api/v1";

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("planning request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Message extracted from a non-success answer, already user-facing.
    #[error("{0}")]
    Rejected(String),
}

/// Client for the planning backend's `POST {api_root}/plan` endpoint.
#[derive(Debug, Clone)]
pub struct HttpPlanner {
    client: reqwest::Client,
    api_root: String,
}

impl HttpPlanner {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_root)
    }

    pub fn with_client(client: reqwest::Client, api_root: impl Into<String>) -> Self {
        let api_root = api_root.into().trim_end_matches('/').to_string();
        Self { client, api_root }
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    pub fn plan_url(&self) -> String {
        format!("{}/plan", self.api_root)
    }

    /// Sends one planning request. A 2xx body is decoded as-is; whether it
    /// reports success is left to the viewer.
    pub async fn plan(&self, request: &PlanRequest) -> Result<PlanResponse, PlannerError> {
        let url = self.plan_url();
        tracing::info!(
            "requesting plan from {url} ({:.5},{:.5}) -> ({:.5},{:.5})",
            request.start.lat,
            request.start.lon,
            request.goal.lat,
            request.goal.lon
        );
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.json::<Value>().await.ok();
            let message = error_message_from_body(status.as_u16(), body.as_ref());
            tracing::warn!("planner answered {status}: {message}");
            return Err(PlannerError::Rejected(message));
        }
        Ok(response.json::<PlanResponse>().await?)
    }
}
