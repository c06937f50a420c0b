//! rios-api: Control plane client
//!
//! This crate provides the four remote operations a worker node performs:
//! - register (unauthenticated)
//! - heartbeat, fetch-next-job and submit-result (bearer token)

pub mod client;
pub mod messages;

pub use client::{ControlPlane, HttpControlPlane};
pub use messages::*;
