//! rios-agent: Worker loop and job executor
//!
//! This crate provides the part of the worker with temporal structure:
//! - `WorkerLoop`: idle/poll/execute state machine with graceful shutdown
//! - `JobExecutor`: stages a job's inputs, runs its container, publishes outputs
//! - Session counters and transport-failure backoff

pub mod backoff;
pub mod executor;
pub mod state;
pub mod worker_loop;

pub use backoff::Backoff;
pub use executor::{JobExecutor, JobRunner};
pub use state::{RunState, SessionCounters};
pub use worker_loop::{JobReport, LoopSettings, PollOutcome, Submission, WorkerLoop};
