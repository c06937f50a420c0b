//! rios-core: Core types for the RiOS worker
//!
//! This crate provides the types shared by every other crate:
//! - Job, task type and status definitions
//! - Node identity and configuration persistence
//! - GPU capability detection
//! - Fixed-point reward amounts
//! - Error handling

pub mod config;
pub mod error;
pub mod gpu;
pub mod identity;
pub mod job;
pub mod reward;

pub use config::*;
pub use error::*;
pub use gpu::*;
pub use identity::*;
pub use job::*;
pub use reward::*;
