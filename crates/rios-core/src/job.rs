//! Job, task type and status definitions

use serde::{Deserialize, Deserializer, Serialize};

use crate::JobError;

/// Mount point of the job input directory inside the container
pub const CONTAINER_INPUT_DIR: &str = "/workspace/input";
/// Mount point of the job output directory inside the container
pub const CONTAINER_OUTPUT_DIR: &str = "/workspace/output";

/// File name ComfyUI workflows are staged under
pub const WORKFLOW_FILE_NAME: &str = "workflow.json";

/// A unit of containerized work handed out by the control plane.
///
/// The node never changes a job; it only reports a disposition for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub job_id: String,
    /// Kind of work, selects the container arguments
    #[serde(default, deserialize_with = "null_as_default")]
    pub task_type: TaskType,
    /// Task-specific parameters
    #[serde(default, deserialize_with = "null_as_default")]
    pub payload: JobPayload,
}

impl Job {
    /// The job ID as a directory name.
    ///
    /// Rejects IDs that could escape the work root (`..`, separators, empty).
    pub fn work_dir_name(&self) -> Result<&str, JobError> {
        if is_safe_path_component(&self.job_id) {
            Ok(&self.job_id)
        } else {
            Err(JobError::WorkDir(format!(
                "job id '{}' is not a valid directory name",
                self.job_id
            )))
        }
    }
}

/// Job payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPayload {
    /// Image to run
    #[serde(default, deserialize_with = "null_as_default")]
    pub docker_image: String,
    /// Where the primary input lives
    #[serde(default, rename = "input_s3_url", skip_serializing_if = "Option::is_none")]
    pub input_url: Option<String>,
    /// Where outputs have to be published
    #[serde(default, rename = "output_s3_path", skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Text prompt for generative tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Optional init video for video workflows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_video_url: Option<String>,
    /// Inline ComfyUI workflow document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_json: Option<serde_json::Value>,
}

impl JobPayload {
    /// Input reference, if one is set and not blank
    pub fn input_reference(&self) -> Option<&str> {
        non_blank(self.input_url.as_deref())
    }

    /// Output destination, if one is set and not blank
    pub fn output_destination(&self) -> Option<&str> {
        non_blank(self.output_path.as_deref())
    }

    /// Init video reference, if one is set and not blank
    pub fn init_video_reference(&self) -> Option<&str> {
        non_blank(self.init_video_url.as_deref())
    }

    /// Prompt, if one is set and not empty
    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.is_empty())
    }
}

/// Supported task types.
///
/// Any tag the node does not know, or a missing one, deserializes to
/// `Unrecognized` and runs the image without extra arguments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// ComfyUI image/video generation
    #[serde(rename = "comfyui")]
    ComfyUi,
    /// Model training on a staged dataset
    Training,
    #[default]
    #[serde(other)]
    Unrecognized,
}

impl TaskType {
    /// Arguments appended after the image name in the container invocation
    pub fn container_args(&self, payload: &JobPayload) -> Vec<String> {
        match self {
            TaskType::ComfyUi => {
                let mut args = vec![
                    "--input".to_string(),
                    format!("{}/{}", CONTAINER_INPUT_DIR, WORKFLOW_FILE_NAME),
                    "--output".to_string(),
                    format!("{}/", CONTAINER_OUTPUT_DIR),
                ];
                if let Some(prompt) = payload.prompt() {
                    args.push("--prompt".to_string());
                    args.push(prompt.to_string());
                }
                args
            }
            TaskType::Training => vec![
                "--dataset".to_string(),
                format!("{}/", CONTAINER_INPUT_DIR),
                "--output".to_string(),
                format!("{}/", CONTAINER_OUTPUT_DIR),
            ],
            TaskType::Unrecognized => Vec::new(),
        }
    }

    /// File name the primary input is staged under inside `input/`
    pub fn input_file_name(&self, reference: &str) -> String {
        match self {
            TaskType::ComfyUi => WORKFLOW_FILE_NAME.to_string(),
            TaskType::Training | TaskType::Unrecognized => {
                reference_file_name(reference).unwrap_or_else(|| "input".to_string())
            }
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskType::ComfyUi => write!(f, "comfyui"),
            TaskType::Training => write!(f, "training"),
            TaskType::Unrecognized => write!(f, "unrecognized"),
        }
    }
}

/// Status reported by a heartbeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStatus {
    Online,
    Busy,
    Offline,
}

impl std::fmt::Display for HeartbeatStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeartbeatStatus::Online => write!(f, "online"),
            HeartbeatStatus::Busy => write!(f, "busy"),
            HeartbeatStatus::Offline => write!(f, "offline"),
        }
    }
}

/// Disposition of a finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
    Failed,
}

/// Last path segment of a URL or path, without query or fragment
pub fn reference_file_name(reference: &str) -> Option<String> {
    let path = reference
        .split(|c: char| c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    path.rsplit('/')
        .next()
        .filter(|name| is_safe_path_component(name))
        .map(str::to_string)
}

/// True when `name` is usable as a single path component
pub fn is_safe_path_component(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c == '\0')
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
