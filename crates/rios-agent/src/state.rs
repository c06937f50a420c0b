//! Worker run-state and session counters

use rios_core::Reward;

/// Worker run-state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// Waiting for the next poll
    #[default]
    Idle,
    /// Heartbeat and job fetch in progress
    Polling,
    /// One job is executing
    Busy,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Idle => write!(f, "Idle"),
            RunState::Polling => write!(f, "Polling"),
            RunState::Busy => write!(f, "Busy"),
        }
    }
}

/// Per-process totals, reset at every start and never persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    /// Results the control plane accepted
    pub jobs_completed: u64,
    /// Sum of the rewards paid for those results
    pub rewards_earned: Reward,
}

impl SessionCounters {
    /// Account for one accepted result
    pub fn record(&mut self, reward: Reward) {
        self.jobs_completed += 1;
        self.rewards_earned += reward;
    }
}
