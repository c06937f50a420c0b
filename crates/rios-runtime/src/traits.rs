//! Runtime trait definitions

use async_trait::async_trait;
use rios_core::RiosResult;
use std::path::PathBuf;

/// Everything needed to run one job container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Image to run
    pub image: String,
    /// Host directory mounted as the container input directory
    pub input_dir: PathBuf,
    /// Host directory mounted as the container output directory
    pub output_dir: PathBuf,
    /// Arguments passed after the image name
    pub args: Vec<String>,
}

/// Runtime trait for executing job containers
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Run a container to completion.
    ///
    /// Returns an error when the container cannot be started or exits
    /// non-zero.
    async fn run(&self, spec: &ContainerSpec) -> RiosResult<()>;

    /// Get the runtime name
    fn name(&self) -> &'static str;
}
