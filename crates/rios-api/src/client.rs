//! Control plane client

use async_trait::async_trait;
use rios_core::{HeartbeatStatus, Job, RiosError, RiosResult};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use crate::messages::{
    GetJobResponse, HeartbeatRequest, RegisterRequest, RegisterResponse, SubmitResultRequest,
    SubmitResultResponse,
};

/// Remote operations the worker performs against the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Register this node
    async fn register(&self, req: &RegisterRequest) -> RiosResult<RegisterResponse>;

    /// Report liveness and status
    async fn heartbeat(&self, status: HeartbeatStatus) -> RiosResult<()>;

    /// Fetch the next job; `None` when nothing is queued
    async fn fetch_next_job(&self) -> RiosResult<Option<Job>>;

    /// Report the disposition of a finished job
    async fn submit_result(&self, req: &SubmitResultRequest) -> RiosResult<SubmitResultResponse>;
}

/// Control plane client speaking JSON over HTTP.
///
/// Any status other than 200 is an `Api` error.
pub struct HttpControlPlane {
    base_url: String,
    client: reqwest::Client,
    auth_token: Option<String>,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, timeout: Duration) -> RiosResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RiosError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            auth_token: None,
        })
    }

    /// Attach the bearer token used for authenticated calls
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, operation: &str, builder: reqwest::RequestBuilder) -> RiosResult<String> {
        let response = builder
            .send()
            .await
            .map_err(|e| RiosError::Network(format!("{}: failed to send request: {}", operation, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RiosError::Network(format!("{}: failed to read response: {}", operation, e)))?;

        debug!(operation, status = %status, "Control plane response");

        if status != reqwest::StatusCode::OK {
            return Err(RiosError::Api(format!(
                "{} failed (status {}): {}",
                operation,
                status.as_u16(),
                body
            )));
        }
        Ok(body)
    }

    fn parse<T: DeserializeOwned>(operation: &str, body: &str) -> RiosResult<T> {
        serde_json::from_str(body).map_err(|e| {
            RiosError::Serialization(format!("{}: failed to parse response: {}", operation, e))
        })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn register(&self, req: &RegisterRequest) -> RiosResult<RegisterResponse> {
        let builder = self.client.post(self.url("/api/worker/register")).json(req);
        let body = self.send("registration", builder).await?;
        Self::parse("registration", &body)
    }

    async fn heartbeat(&self, status: HeartbeatStatus) -> RiosResult<()> {
        let builder = self.authorized(
            self.client
                .post(self.url("/api/worker/heartbeat"))
                .json(&HeartbeatRequest { status }),
        );
        self.send("heartbeat", builder).await?;
        Ok(())
    }

    async fn fetch_next_job(&self) -> RiosResult<Option<Job>> {
        let builder = self.authorized(self.client.get(self.url("/api/worker/get-job")));
        let body = self.send("get job", builder).await?;
        let response: GetJobResponse = Self::parse("get job", &body)?;
        if response.job.is_none() && !response.message.is_empty() {
            debug!(message = %response.message, "No job returned");
        }
        Ok(response.job)
    }

    async fn submit_result(&self, req: &SubmitResultRequest) -> RiosResult<SubmitResultResponse> {
        let builder = self.authorized(
            self.client
                .post(self.url("/api/worker/submit-result"))
                .json(req),
        );
        let body = self.send("submit result", builder).await?;
        Self::parse("submit result", &body)
    }
}
