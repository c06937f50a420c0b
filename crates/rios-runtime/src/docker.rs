//! Docker-based runtime implementation
//!
//! Runs each job as `docker run --rm --gpus all` with the job's input and
//! output directories bind-mounted. The container's stdout and stderr are
//! inherited so its logs show up live in the worker's terminal.

use async_trait::async_trait;
use rios_core::{RiosError, RiosResult, CONTAINER_INPUT_DIR, CONTAINER_OUTPUT_DIR};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, error, info};

use crate::traits::{ContainerRuntime, ContainerSpec};

/// Image used to verify that containers can reach the GPU
pub const GPU_PROBE_IMAGE: &str = "nvidia/cuda:12.0.0-base-ubuntu22.04";

/// Docker runtime configuration
#[derive(Debug, Clone)]
pub struct DockerRuntimeConfig {
    /// Path to the docker binary
    pub binary: PathBuf,
    /// Value for `--gpus`, `None` to run without GPU access
    pub gpus: Option<String>,
}

impl Default for DockerRuntimeConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            gpus: Some("all".to_string()),
        }
    }
}

/// Docker runtime for executing job containers
pub struct DockerRuntime {
    config: DockerRuntimeConfig,
}

impl DockerRuntime {
    /// Create a new docker runtime
    pub fn new(config: DockerRuntimeConfig) -> Self {
        Self { config }
    }

    /// Build the `docker` argument list for a job container
    pub fn build_args(&self, spec: &ContainerSpec) -> Vec<String> {
        let mut args = vec!["run".to_string(), "--rm".to_string()];

        if let Some(ref gpus) = self.config.gpus {
            args.push("--gpus".to_string());
            args.push(gpus.clone());
        }

        args.push("-v".to_string());
        args.push(format!("{}:{}", spec.input_dir.display(), CONTAINER_INPUT_DIR));
        args.push("-v".to_string());
        args.push(format!("{}:{}", spec.output_dir.display(), CONTAINER_OUTPUT_DIR));

        args.push(spec.image.clone());
        args.extend(spec.args.iter().cloned());
        args
    }

    /// Check that the docker CLI is installed
    pub async fn check_installed(&self) -> RiosResult<()> {
        if self.probe(&["--version"]).await {
            Ok(())
        } else {
            Err(RiosError::Environment(
                "Docker is not installed or not in PATH. Please install Docker: https://docs.docker.com/get-docker/"
                    .to_string(),
            ))
        }
    }

    /// Check that the docker daemon answers
    pub async fn check_running(&self) -> RiosResult<()> {
        if self.probe(&["ps"]).await {
            Ok(())
        } else {
            Err(RiosError::Environment(
                "Docker daemon is not running. Please start Docker".to_string(),
            ))
        }
    }

    /// Check that containers can use the GPU (pulls a CUDA base image)
    pub async fn check_gpu_support(&self) -> RiosResult<()> {
        let gpus = self.config.gpus.as_deref().unwrap_or("all");
        if self
            .probe(&["run", "--rm", "--gpus", gpus, GPU_PROBE_IMAGE, "nvidia-smi"])
            .await
        {
            Ok(())
        } else {
            Err(RiosError::Environment(
                "NVIDIA Docker runtime not available. Please install the NVIDIA Container Toolkit: https://docs.nvidia.com/datacenter/cloud-native/container-toolkit/install-guide.html"
                    .to_string(),
            ))
        }
    }

    async fn probe(&self, args: &[&str]) -> bool {
        let result = Command::new(&self.config.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) => status.success(),
            Err(e) => {
                debug!(binary = %self.config.binary.display(), error = %e, "Runtime probe failed");
                false
            }
        }
    }
}

impl Default for DockerRuntime {
    fn default() -> Self {
        Self::new(DockerRuntimeConfig::default())
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn run(&self, spec: &ContainerSpec) -> RiosResult<()> {
        if spec.image.trim().is_empty() {
            return Err(RiosError::Runtime("job has no docker image".to_string()));
        }

        let args = self.build_args(spec);
        info!(image = %spec.image, "Running container");
        debug!(args = ?args, "Container arguments");

        let status = Command::new(&self.config.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| {
                error!(image = %spec.image, error = %e, "Failed to spawn container");
                RiosError::Runtime(format!("Failed to spawn container: {}", e))
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(RiosError::Runtime(format!("container exited with {}", status)))
        }
    }

    fn name(&self) -> &'static str {
        "docker"
    }
}
