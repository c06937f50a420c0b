//! Error types for the RiOS worker

use thiserror::Error;

/// Main error type for the RiOS worker
#[derive(Error, Debug)]
pub enum RiosError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No identity record is stored; the node has to register first
    #[error("Node is not registered: {0}")]
    NotRegistered(String),

    /// Wallet address failed validation
    #[error("Invalid wallet address: {0}")]
    InvalidWallet(String),

    /// GPU error
    #[error("GPU error: {0}")]
    Gpu(String),

    /// Host environment is not able to run jobs (missing runtime, daemon down)
    #[error("Environment error: {0}")]
    Environment(String),

    /// Runtime error
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Control plane answered with a non-success status
    #[error("API error: {0}")]
    Api(String),

    /// Object transfer error
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for RiOS worker operations
pub type RiosResult<T> = Result<T, RiosError>;

impl From<serde_json::Error> for RiosError {
    fn from(err: serde_json::Error) -> Self {
        RiosError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for RiosError {
    fn from(err: toml::de::Error) -> Self {
        RiosError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RiosError {
    fn from(err: toml::ser::Error) -> Self {
        RiosError::Serialization(err.to_string())
    }
}

/// Failure of a single job execution.
///
/// Each variant names the executor step that failed. The worker loop reports
/// all of them to the control plane the same way, as a `failed` disposition
/// carrying the display text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The job working area could not be created
    #[error("failed to create job work directory: {0}")]
    WorkDir(String),

    /// The job input could not be materialized
    #[error("failed to stage job input: {0}")]
    InputStaging(String),

    /// The container could not be spawned or exited non-zero
    #[error("container execution failed: {0}")]
    Execution(String),

    /// The container exited cleanly but wrote nothing
    #[error("no output files generated")]
    NoOutput,

    /// The produced output could not be published
    #[error("failed to publish output: {0}")]
    OutputPublish(String),
}

impl JobError {
    pub fn is_work_dir(&self) -> bool {
        matches!(self, JobError::WorkDir(_))
    }

    pub fn is_input_staging(&self) -> bool {
        matches!(self, JobError::InputStaging(_))
    }

    pub fn is_execution(&self) -> bool {
        matches!(self, JobError::Execution(_))
    }

    pub fn is_no_output(&self) -> bool {
        matches!(self, JobError::NoOutput)
    }

    pub fn is_output_publish(&self) -> bool {
        matches!(self, JobError::OutputPublish(_))
    }
}
