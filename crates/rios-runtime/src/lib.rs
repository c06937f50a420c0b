//! rios-runtime: Container runtime abstraction
//!
//! This crate provides the runtimes jobs are executed with:
//! - `ContainerRuntime` trait used by the job executor
//! - Docker CLI implementation with GPU passthrough
//! - Host environment checks run before the worker starts

pub mod docker;
pub mod traits;

pub use docker::{DockerRuntime, DockerRuntimeConfig};
pub use traits::{ContainerRuntime, ContainerSpec};
