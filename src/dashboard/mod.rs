//! Live multi-process dashboard: spawns a process group, tracks each process
//! and composes throttled frames until the user stops and confirms the run.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::model::ProcessGroup;

mod activity;
mod classify;
mod config;
mod diagnostics;
mod lifecycle;
mod output;
mod palette;
mod render;
mod run;
mod state;
mod terminal_text;
mod tracker;

pub use activity::{ActivityBuffer, ActivityMarker};
pub use classify::{KeywordClassifier, OutputClassifier};
pub use config::{
    ManagerConfig, Viewport, DEFAULT_ACTIVITY_CAPACITY, DEFAULT_GRACE_PERIOD,
    DEFAULT_IDLE_TICK, DEFAULT_OUTPUT_CAPACITY, DEFAULT_THROTTLE, FALLBACK_VIEWPORT,
};
pub use lifecycle::{InputSession, TerminalScreen};
pub use output::OutputBuffer;
pub use palette::{RunPalette, TrackerColor};
pub use state::{RunAborted, RunHandle, RunState, RunStatus, RunSummary};
pub use terminal_text::{format_elapsed, strip_terminal_sequences};
pub use tracker::TrackerReport;

use run::Run;

#[derive(Debug)]
pub enum ManagerError {
    /// `execute` was called while another run was still active.
    AlreadyRunning,
    /// The terminal input stream could not be taken over for the run.
    InputSession(std::io::Error),
    /// Reading keypresses failed mid-run.
    Input(std::io::Error),
}

impl std::fmt::Display for ManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagerError::AlreadyRunning => write!(f, "a run is already in progress"),
            ManagerError::InputSession(error) => {
                write!(f, "failed to acquire terminal input: {error}")
            }
            ManagerError::Input(error) => write!(f, "failed to read terminal input: {error}"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManagerError::AlreadyRunning => None,
            ManagerError::InputSession(error) | ManagerError::Input(error) => Some(error),
        }
    }
}

/// Shared between the control loop and callers of `cancel`, `confirm` and
/// `status`. The state field is the single source of truth for transitions.
struct RunSlot {
    status: RunStatus,
    handle: Option<RunHandle>,
}

impl RunSlot {
    fn cancel(&mut self) -> bool {
        if self.status.state != RunState::Running {
            return false;
        }
        self.status.state = RunState::Cancelling { all_stopped: false };
        true
    }

    fn confirm(&mut self) -> bool {
        if self.status.state != (RunState::Cancelling { all_stopped: true }) {
            return false;
        }
        self.status.state = RunState::Confirmed;
        true
    }

    /// Stop key semantics: cancel while running, confirm once everything has
    /// stopped, otherwise nothing.
    fn request_stop(&mut self) {
        if !self.cancel() {
            self.confirm();
        }
    }
}

fn lock_slot(shared: &Mutex<RunSlot>) -> MutexGuard<'_, RunSlot> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns one run at a time. Clones share the same run, so a clone can be
/// handed to another thread to cancel, confirm or observe it.
#[derive(Clone)]
pub struct ProcessManager {
    config: ManagerConfig,
    classifier: Arc<dyn OutputClassifier>,
    shared: Arc<Mutex<RunSlot>>,
}

impl ProcessManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            classifier: Arc::new(KeywordClassifier::default()),
            shared: Arc::new(Mutex::new(RunSlot {
                status: RunStatus::idle(),
                handle: None,
            })),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OutputClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn status(&self) -> RunStatus {
        lock_slot(&self.shared).status
    }

    /// Handle of the active run, or of the last finished one.
    pub fn current_run(&self) -> Option<RunHandle> {
        lock_slot(&self.shared).handle.clone()
    }

    /// Requests cancellation. Only acts while the run is `Running`.
    pub fn cancel(&self) {
        lock_slot(&self.shared).cancel();
    }

    /// Resolves the run once every process has stopped. Ignored otherwise.
    pub fn confirm(&self) {
        lock_slot(&self.shared).confirm();
    }

    /// Runs `group` on the calling thread until the run is confirmed, handing
    /// every composed frame to `sink` at most once per `throttle`.
    pub fn execute<F>(
        &self,
        group: &ProcessGroup,
        mut sink: F,
        throttle: Duration,
    ) -> Result<RunSummary, ManagerError>
    where
        F: FnMut(&str),
    {
        let handle = RunHandle::new();
        {
            let mut slot = lock_slot(&self.shared);
            if slot.status.state.is_active() {
                return Err(ManagerError::AlreadyRunning);
            }
            slot.status = RunStatus {
                state: RunState::Running,
                pending: group.enabled_projects().count(),
                spawned: 0,
                done: 0,
            };
            slot.handle = Some(handle.clone());
        }

        let mut completion = Completion {
            shared: &self.shared,
            handle,
            settled: false,
        };
        let result = self.drive(group, &mut sink, throttle);
        completion.settle(&result);
        result
    }

    fn drive(
        &self,
        group: &ProcessGroup,
        sink: &mut dyn FnMut(&str),
        throttle: Duration,
    ) -> Result<RunSummary, ManagerError> {
        let mut input = if self.config.interactive {
            Some(InputSession::acquire().map_err(ManagerError::InputSession)?)
        } else {
            None
        };
        let mut run = Run::start(group, &self.config, Arc::clone(&self.classifier));
        let outcome = run.event_loop(&self.shared, input.as_mut(), sink, throttle);
        let restore_warning = match input {
            Some(session) => session
                .release()
                .err()
                .map(|error| format!("failed to restore terminal mode: {error}")),
            None => None,
        };
        outcome?;
        Ok(run.into_summary(restore_warning))
    }
}

/// Resolves the run handle and frees the manager on every exit path,
/// including a panicking frame sink.
struct Completion<'a> {
    shared: &'a Mutex<RunSlot>,
    handle: RunHandle,
    settled: bool,
}

impl Completion<'_> {
    fn settle(&mut self, result: &Result<RunSummary, ManagerError>) {
        self.settled = true;
        let mut slot = lock_slot(self.shared);
        match result {
            Ok(summary) => {
                slot.status.state = RunState::Confirmed;
                self.handle.complete(Ok(summary.clone()));
            }
            Err(error) => {
                slot.status.state = RunState::Idle;
                self.handle.complete(Err(RunAborted {
                    reason: error.to_string(),
                }));
            }
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        lock_slot(self.shared).status.state = RunState::Idle;
        self.handle.complete(Err(RunAborted {
            reason: "run loop panicked".to_owned(),
        }));
    }
}
