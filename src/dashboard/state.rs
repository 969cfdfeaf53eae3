use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::tracker::TrackerReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    /// Cancellation requested. `all_stopped` flips once every tracker is done;
    /// the run still waits for a confirmation after that.
    Cancelling { all_stopped: bool },
    Confirmed,
}

impl RunState {
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Running | RunState::Cancelling { .. })
    }

    pub fn label(self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Cancelling { all_stopped: false } => "cancelling",
            RunState::Cancelling { all_stopped: true } => "all-stopped",
            RunState::Confirmed => "confirmed",
        }
    }
}

/// Snapshot of the active run published by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub state: RunState,
    /// Projects still waiting for their start delay.
    pub pending: usize,
    pub spawned: usize,
    pub done: usize,
}

impl RunStatus {
    pub(super) fn idle() -> Self {
        Self {
            state: RunState::Idle,
            pending: 0,
            spawned: 0,
            done: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub group: String,
    pub trackers: Vec<TrackerReport>,
    /// Set when the terminal could not be returned to its previous mode.
    pub restore_warning: Option<String>,
    pub diagnostics: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunAborted {
    pub reason: String,
}

impl std::fmt::Display for RunAborted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run aborted: {}", self.reason)
    }
}

impl std::error::Error for RunAborted {}

type RunResult = Result<RunSummary, RunAborted>;

/// Awaitable completion of one run, shareable across threads.
#[derive(Debug, Clone, Default)]
pub struct RunHandle {
    inner: Arc<(Mutex<Option<RunResult>>, Condvar)>,
}

impl RunHandle {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn complete(&self, result: RunResult) {
        let (slot, ready) = &*self.inner;
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(result);
        }
        ready.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        let (slot, _) = &*self.inner;
        slot.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Blocks until the run resolves.
    pub fn wait(&self) -> RunResult {
        let (slot, ready) = &*self.inner;
        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`RunHandle::wait`] but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RunResult> {
        let (slot, ready) = &*self.inner;
        let slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let (slot, _) = ready
            .wait_timeout_while(slot, timeout, |result| result.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        slot.clone()
    }
}
