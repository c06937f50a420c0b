//! Worker loop
//!
//! Drives the Idle → Polling → Busy cycle on a fixed cadence. Every remote
//! failure is logged and retried on a later poll; only the shutdown future
//! ends the loop.
//!
//! The run-state, the session counters and the handle of the single
//! in-flight job are owned by the loop. A job runs on its own task and hands
//! its [`JobReport`] back through its `JoinHandle`; no new poll is scheduled
//! while that handle is held.

use rios_api::{ControlPlane, SubmitResultRequest};
use rios_core::{HeartbeatStatus, Job, ResultStatus, Reward, WorkerSettings};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::executor::JobRunner;
use crate::state::{RunState, SessionCounters};

/// Timing of the worker loop
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub backoff_enabled: bool,
    pub max_backoff: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self::from(&WorkerSettings::default())
    }
}

impl From<&WorkerSettings> for LoopSettings {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            poll_interval: settings.poll_interval(),
            backoff_enabled: settings.backoff_enabled,
            max_backoff: settings.max_backoff(),
        }
    }
}

/// What a single poll did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A job is still in flight; nothing was sent
    Busy,
    /// The online heartbeat failed; no job was fetched
    HeartbeatFailed,
    /// The job fetch failed
    FetchFailed,
    /// Nothing queued
    NoJob,
    /// A job was accepted and handed to the runner
    Dispatched(String),
}

/// How the control plane answered a submit-result call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Accepted, with the reward paid
    Accepted(Reward),
    /// Answered with `success: false`
    Rejected(String),
    /// The call itself failed
    Failed(String),
}

/// Result of one in-flight job task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub job_id: String,
    pub succeeded: bool,
    pub submission: Submission,
}

/// Polling state machine for one worker node
pub struct WorkerLoop<C, E> {
    control_plane: Arc<C>,
    runner: Arc<E>,
    settings: LoopSettings,
    state: RunState,
    counters: SessionCounters,
    in_flight: Option<InFlight>,
    backoff: Backoff,
}

/// The single running job task
struct InFlight {
    job_id: String,
    handle: JoinHandle<JobReport>,
}

impl<C, E> WorkerLoop<C, E>
where
    C: ControlPlane + 'static,
    E: JobRunner + 'static,
{
    pub fn new(control_plane: Arc<C>, runner: Arc<E>, settings: LoopSettings) -> Self {
        let backoff = Backoff::new(
            settings.poll_interval,
            settings.max_backoff,
            settings.backoff_enabled,
        );
        Self {
            control_plane,
            runner,
            settings,
            state: RunState::Idle,
            counters: SessionCounters::default(),
            in_flight: None,
            backoff,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Delay until the next poll given the recent transport failures
    pub fn next_delay(&self) -> Duration {
        self.backoff.delay()
    }

    /// Run one poll: online heartbeat, then fetch, then dispatch.
    pub async fn poll_once(&mut self) -> PollOutcome {
        if self.is_busy() {
            debug!("Job in flight, skipping poll");
            return PollOutcome::Busy;
        }

        self.state = RunState::Polling;

        if let Err(e) = self.control_plane.heartbeat(HeartbeatStatus::Online).await {
            warn!(error = %e, "Heartbeat failed");
            self.backoff.record_failure();
            self.state = RunState::Idle;
            return PollOutcome::HeartbeatFailed;
        }

        let job = match self.control_plane.fetch_next_job().await {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "Failed to fetch job");
                self.backoff.record_failure();
                self.state = RunState::Idle;
                return PollOutcome::FetchFailed;
            }
        };
        self.backoff.reset();

        match job {
            Some(job) => {
                let job_id = job.job_id.clone();
                self.dispatch(job);
                PollOutcome::Dispatched(job_id)
            }
            None => {
                debug!("No jobs available");
                self.state = RunState::Idle;
                PollOutcome::NoJob
            }
        }
    }

    fn dispatch(&mut self, job: Job) {
        info!(
            job_id = %job.job_id,
            task_type = %job.task_type,
            image = %job.payload.docker_image,
            "Received job"
        );
        self.state = RunState::Busy;
        let job_id = job.job_id.clone();
        let handle = tokio::spawn(run_job(
            Arc::clone(&self.control_plane),
            Arc::clone(&self.runner),
            job,
        ));
        self.in_flight = Some(InFlight { job_id, handle });
    }

    /// Wait for the in-flight job, if any, and account for it.
    pub async fn wait_for_job(&mut self) -> Option<JobReport> {
        if !self.is_busy() {
            return None;
        }
        let result = join_in_flight(&mut self.in_flight).await;
        self.finish(result).await
    }

    async fn finish(&mut self, result: Result<JobReport, JoinError>) -> Option<JobReport> {
        let job_id = self.in_flight.take().map(|job| job.job_id)?;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                // The task died before submitting; report the job as failed
                let reason = panic_message(e);
                error!(job_id = %job_id, error = %reason, "Job task aborted");
                let request = SubmitResultRequest {
                    job_id: job_id.clone(),
                    status: ResultStatus::Failed,
                    output_url: None,
                    error_message: Some(format!("job task aborted: {}", reason)),
                };
                JobReport {
                    submission: submit(self.control_plane.as_ref(), &request).await,
                    job_id,
                    succeeded: false,
                }
            }
        };
        self.state = RunState::Idle;

        if let Submission::Accepted(reward) = report.submission {
            self.counters.record(reward);
            info!(
                job_id = %report.job_id,
                reward = %reward,
                jobs_completed = self.counters.jobs_completed,
                rewards_earned = %self.counters.rewards_earned,
                "Result accepted"
            );
        }
        Some(report)
    }

    /// Run until `shutdown` resolves, then drain and go offline.
    ///
    /// The first poll happens immediately.
    pub async fn run<F>(&mut self, shutdown: F) -> SessionCounters
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.settings.poll_interval.as_secs(),
            "Worker loop started"
        );
        let mut next_poll = Instant::now();

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!(state = %self.state, "Shutdown signal received");
                    break;
                }
                result = join_in_flight(&mut self.in_flight), if self.in_flight.is_some() => {
                    self.finish(result).await;
                }
                _ = tokio::time::sleep_until(next_poll), if self.in_flight.is_none() => {
                    self.poll_once().await;
                    next_poll = Instant::now() + self.backoff.delay();
                }
            }
        }

        self.shutdown().await
    }

    /// Stop scheduling, let the in-flight job submit, send the offline
    /// heartbeat and return the session counters.
    pub async fn shutdown(&mut self) -> SessionCounters {
        if self.is_busy() {
            info!("Waiting for in-flight job to finish");
            self.wait_for_job().await;
        }

        if let Err(e) = self.control_plane.heartbeat(HeartbeatStatus::Offline).await {
            warn!(error = %e, "Failed to send offline heartbeat");
        }
        self.state = RunState::Idle;
        self.counters
    }
}

async fn join_in_flight(in_flight: &mut Option<InFlight>) -> Result<JobReport, JoinError> {
    match in_flight {
        Some(job) => (&mut job.handle).await,
        None => std::future::pending().await,
    }
}

fn panic_message(err: JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "job task panicked".to_string()
    }
}

async fn submit<C>(control_plane: &C, request: &SubmitResultRequest) -> Submission
where
    C: ControlPlane + ?Sized,
{
    match control_plane.submit_result(request).await {
        Ok(response) if response.success => Submission::Accepted(response.reward_paid),
        Ok(response) => {
            warn!(job_id = %request.job_id, message = %response.message, "Result rejected");
            Submission::Rejected(response.message)
        }
        Err(e) => {
            error!(job_id = %request.job_id, error = %e, "Failed to submit result");
            Submission::Failed(e.to_string())
        }
    }
}

async fn run_job<C, E>(control_plane: Arc<C>, runner: Arc<E>, job: Job) -> JobReport
where
    C: ControlPlane,
    E: JobRunner,
{
    if let Err(e) = control_plane.heartbeat(HeartbeatStatus::Busy).await {
        warn!(job_id = %job.job_id, error = %e, "Busy heartbeat failed");
    }

    let outcome = runner.execute(&job).await;
    match &outcome {
        Ok(output_url) => info!(job_id = %job.job_id, output_url = %output_url, "Job completed"),
        Err(e) => error!(job_id = %job.job_id, error = %e, "Job failed"),
    }

    let request = SubmitResultRequest::from_outcome(&job.job_id, &outcome);
    let submission = submit(control_plane.as_ref(), &request).await;

    JobReport {
        job_id: job.job_id,
        succeeded: outcome.is_ok(),
        submission,
    }
}
