//! Control plane request and response bodies

use rios_core::{Capability, HeartbeatStatus, Job, JobError, ResultStatus, Reward};
use serde::{Deserialize, Serialize};

/// Registration request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub gpu_type: String,
    pub gpu_vram: u32,
    pub gpu_count: u32,
    pub ros_wallet_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor_name: Option<String>,
}

impl RegisterRequest {
    pub fn new(
        capability: &Capability,
        wallet_address: String,
        contributor_name: Option<String>,
    ) -> Self {
        Self {
            gpu_type: capability.gpu_type.clone(),
            gpu_vram: capability.memory_gb,
            gpu_count: capability.count,
            ros_wallet_address: wallet_address,
            contributor_name: contributor_name.filter(|n| !n.trim().is_empty()),
        }
    }
}

/// Registration response
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    #[serde(default)]
    pub node_id: i64,
    #[serde(default)]
    pub node_auth_token: String,
    #[serde(default)]
    pub message: String,
}

/// Heartbeat request
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatRequest {
    pub status: HeartbeatStatus,
}

/// Heartbeat response
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// Fetch-next-job response; `job` is null when nothing is queued
#[derive(Debug, Clone, Deserialize)]
pub struct GetJobResponse {
    pub success: bool,
    #[serde(default)]
    pub job: Option<Job>,
    #[serde(default)]
    pub message: String,
}

/// Submit-result request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResultRequest {
    pub job_id: String,
    pub status: ResultStatus,
    #[serde(rename = "output_s3_url", skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SubmitResultRequest {
    /// Build the disposition for a finished job.
    ///
    /// `completed` with the output reference on success, `failed` with the
    /// error text otherwise.
    pub fn from_outcome(job_id: &str, outcome: &Result<String, JobError>) -> Self {
        match outcome {
            Ok(output_url) => Self {
                job_id: job_id.to_string(),
                status: ResultStatus::Completed,
                output_url: Some(output_url.clone()),
                error_message: None,
            },
            Err(e) => Self {
                job_id: job_id.to_string(),
                status: ResultStatus::Failed,
                output_url: None,
                error_message: Some(e.to_string()),
            },
        }
    }
}

/// Submit-result response
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitResultResponse {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reward_paid: Reward,
}
