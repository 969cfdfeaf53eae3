use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::model::{ProcessGroup, Project};
use crate::process_manager::{
    spawn_process, ProcessEvent, ProcessEventKind, TerminationSignal,
};

use super::classify::OutputClassifier;
use super::config::{ManagerConfig, LOOP_WAIT, MAX_EVENTS_PER_TICK};
use super::diagnostics::RuntimeDiagnostics;
use super::lifecycle::InputSession;
use super::palette::RunPalette;
use super::render::{compose_frame, FrameInput};
use super::state::{RunState, RunSummary};
use super::tracker::{ProcessTracker, TerminationStep};
use super::{lock_slot, ManagerError, RunSlot};

const MIN_IDLE_TICK: Duration = Duration::from_millis(1);

struct PendingSpawn {
    slot: usize,
    due: Instant,
    project: Project,
}

/// State owned by the control loop for the lifetime of one run.
pub(super) struct Run<'a> {
    group: String,
    config: &'a ManagerConfig,
    classifier: Arc<dyn OutputClassifier>,
    palette: RunPalette,
    started_at: Instant,
    pending: Vec<PendingSpawn>,
    trackers: Vec<ProcessTracker>,
    events_tx: Sender<ProcessEvent>,
    events_rx: Receiver<ProcessEvent>,
    next_idle_tick: Instant,
    last_frame: Option<Instant>,
    last_state: RunState,
    dirty: bool,
    diagnostics: RuntimeDiagnostics,
}

impl<'a> Run<'a> {
    pub(super) fn start(
        group: &ProcessGroup,
        config: &'a ManagerConfig,
        classifier: Arc<dyn OutputClassifier>,
    ) -> Self {
        let started_at = Instant::now();
        let pending = group
            .enabled_projects()
            .enumerate()
            .map(|(slot, project)| PendingSpawn {
                slot,
                due: started_at + project.delay,
                project: project.clone(),
            })
            .collect::<Vec<PendingSpawn>>();
        let (events_tx, events_rx) = mpsc::channel();
        let mut diagnostics = RuntimeDiagnostics::new(config.diagnostics);
        diagnostics.record_transition(RunState::Running.label());
        Self {
            group: group.name.clone(),
            config,
            classifier,
            palette: RunPalette::random(),
            started_at,
            pending,
            trackers: Vec::new(),
            events_tx,
            events_rx,
            next_idle_tick: started_at + config.idle_tick.max(MIN_IDLE_TICK),
            last_frame: None,
            last_state: RunState::Running,
            dirty: true,
            diagnostics,
        }
    }

    /// Drives the run until it is confirmed. Every iteration spawns due
    /// projects (or escalates termination while cancelling), drains process
    /// events, handles keys, publishes status and renders when allowed.
    pub(super) fn event_loop(
        &mut self,
        shared: &Mutex<RunSlot>,
        mut input: Option<&mut InputSession>,
        sink: &mut dyn FnMut(&str),
        throttle: Duration,
    ) -> Result<(), ManagerError> {
        loop {
            let now = Instant::now();
            let state = lock_slot(shared).status.state;
            match state {
                RunState::Confirmed => {
                    self.diagnostics.record_transition(state.label());
                    return Ok(());
                }
                RunState::Cancelling { .. } => {
                    self.drop_pending();
                    self.escalate(now);
                }
                RunState::Idle | RunState::Running => self.spawn_due(now),
            }

            self.drain_events(self.wait_budget(now, throttle));
            self.tick_idle(Instant::now());

            if let Some(session) = input.as_deref_mut() {
                let key = session
                    .poll_stop_key(Duration::ZERO)
                    .map_err(ManagerError::Input)?;
                if let Some(key) = key {
                    self.diagnostics.record_keypress(&format!("{:?}", key.code));
                    lock_slot(shared).request_stop();
                }
            }

            let state = self.publish(shared);
            self.render(state, sink, throttle);
        }
    }

    fn wait_budget(&self, now: Instant, throttle: Duration) -> Duration {
        let mut wait = LOOP_WAIT.min(self.next_idle_tick.saturating_duration_since(now));
        if let Some(next_due) = self.pending.iter().map(|pending| pending.due).min() {
            wait = wait.min(next_due.saturating_duration_since(now));
        }
        if self.dirty {
            if let Some(last) = self.last_frame {
                wait = wait.min((last + throttle).saturating_duration_since(now));
            }
        }
        wait
    }

    fn spawn_due(&mut self, now: Instant) {
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].due <= now {
                let pending = self.pending.remove(index);
                self.spawn(pending, now);
            } else {
                index += 1;
            }
        }
    }

    fn spawn(&mut self, pending: PendingSpawn, now: Instant) {
        let started_after = now.saturating_duration_since(self.started_at);
        let color = self.palette.color_for(pending.slot);
        let capacities = (self.config.activity_capacity, self.config.output_capacity);
        let tracker = match spawn_process(pending.slot, &pending.project, &self.events_tx) {
            Ok(process) => {
                self.diagnostics
                    .record_spawn(&pending.project.name, &format!("pid {}", process.pid()));
                ProcessTracker::spawned(
                    pending.slot,
                    &pending.project,
                    process,
                    color,
                    capacities,
                    started_after,
                )
            }
            Err(error) => {
                self.diagnostics
                    .record_spawn(&pending.project.name, &error.to_string());
                ProcessTracker::failed(
                    pending.slot,
                    &pending.project,
                    error.failure(),
                    color,
                    capacities,
                    started_after,
                )
            }
        };
        let position = self
            .trackers
            .partition_point(|existing| existing.slot < tracker.slot);
        self.trackers.insert(position, tracker);
        self.dirty = true;
    }

    fn drop_pending(&mut self) {
        for pending in self.pending.drain(..) {
            self.diagnostics
                .record_spawn(&pending.project.name, "skipped: run cancelled");
            self.dirty = true;
        }
    }

    /// Sends whatever signal each tracker's termination sub-state calls for.
    /// All trackers are handled in one pass so their grace periods overlap.
    fn escalate(&mut self, now: Instant) {
        let grace = self.config.grace_period;
        for tracker in &mut self.trackers {
            let Some(step) = tracker.next_termination_step(now, grace) else {
                continue;
            };
            let Some(process) = tracker.process.clone() else {
                continue;
            };
            self.dirty = true;
            let (signal, label) = match step {
                TerminationStep::Graceful => (TerminationSignal::Graceful, "SIGTERM"),
                TerminationStep::Forced | TerminationStep::Sweep => {
                    (TerminationSignal::Forced, "SIGKILL")
                }
            };
            if step == TerminationStep::Forced && process.has_exited() {
                self.diagnostics
                    .record_signal(&tracker.display_name, label, "skipped: exited");
                continue;
            }
            match process.signal(signal) {
                Ok(()) if step == TerminationStep::Sweep => {
                    self.diagnostics
                        .record_signal(&tracker.display_name, label, "sent to group");
                }
                Ok(()) => {
                    tracker.note_signal_sent(step);
                    self.diagnostics
                        .record_signal(&tracker.display_name, label, "sent");
                }
                Err(error) => {
                    tracker.output.push(&error.to_string());
                    self.diagnostics
                        .record_signal(&tracker.display_name, label, "failed");
                }
            }
        }
    }

    fn drain_events(&mut self, wait: Duration) {
        let mut drained = 0;
        let mut next = self.events_rx.recv_timeout(wait).ok();
        while let Some(event) = next {
            self.apply(event);
            drained += 1;
            if drained >= MAX_EVENTS_PER_TICK {
                break;
            }
            next = self.events_rx.try_recv().ok();
        }
    }

    fn apply(&mut self, event: ProcessEvent) {
        let Some(tracker) = self
            .trackers
            .iter_mut()
            .find(|tracker| tracker.slot == event.tracker)
        else {
            return;
        };
        match event.kind {
            ProcessEventKind::Output { stream, chunk } => {
                self.diagnostics
                    .record_output_chunk(&tracker.display_name, chunk.len());
                tracker.record_output(stream, &chunk, self.classifier.as_ref());
            }
            ProcessEventKind::Error(failure) => {
                self.diagnostics
                    .record_exit(&tracker.display_name, &failure.line());
                tracker.record_failure(failure);
            }
            ProcessEventKind::Exit(exit) => {
                self.diagnostics
                    .record_exit(&tracker.display_name, &exit.diagnostic());
                tracker.record_exit(exit);
            }
        }
        self.dirty = true;
    }

    fn tick_idle(&mut self, now: Instant) {
        if now < self.next_idle_tick {
            return;
        }
        for tracker in &mut self.trackers {
            if tracker.idle_tick() {
                self.dirty = true;
            }
        }
        self.next_idle_tick = now + self.config.idle_tick.max(MIN_IDLE_TICK);
    }

    /// Writes counts to the shared slot and flips `all_stopped` once nothing
    /// is pending or running. Returns the state the frame should show.
    fn publish(&mut self, shared: &Mutex<RunSlot>) -> RunState {
        let done = self.trackers.iter().filter(|tracker| tracker.done).count();
        let mut slot = lock_slot(shared);
        if slot.status.state == (RunState::Cancelling { all_stopped: false })
            && self.pending.is_empty()
            && done == self.trackers.len()
        {
            slot.status.state = RunState::Cancelling { all_stopped: true };
        }
        slot.status.pending = self.pending.len();
        slot.status.spawned = self.trackers.len();
        slot.status.done = done;
        slot.status.state
    }

    fn render(&mut self, state: RunState, sink: &mut dyn FnMut(&str), throttle: Duration) {
        if state != self.last_state {
            self.diagnostics.record_transition(state.label());
            self.last_state = state;
            self.dirty = true;
        }
        if !self.dirty || state == RunState::Confirmed {
            return;
        }
        let now = Instant::now();
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < throttle {
                return;
            }
        }
        let frame = compose_frame(&FrameInput {
            group: &self.group,
            trackers: &self.trackers,
            state,
            pending: self.pending.len(),
            size: self.config.viewport.size(),
            color: self.config.color,
        });
        sink(&frame);
        self.diagnostics.record_frame();
        self.last_frame = Some(now);
        self.dirty = false;
    }

    pub(super) fn into_summary(mut self, restore_warning: Option<String>) -> RunSummary {
        let diagnostics = std::mem::replace(
            &mut self.diagnostics,
            RuntimeDiagnostics::new(false),
        );
        RunSummary {
            group: self.group.clone(),
            trackers: self.trackers.iter().map(ProcessTracker::report).collect(),
            restore_warning,
            diagnostics: diagnostics.into_lines(),
        }
    }

    fn force_stop_live(&mut self) {
        for tracker in &self.trackers {
            if tracker.done {
                continue;
            }
            if let Some(process) = &tracker.process {
                if !process.has_exited() {
                    let _ = process.signal(TerminationSignal::Forced);
                }
            }
        }
    }
}

/// Anything still alive when the loop is left early (error or panic in the
/// frame sink) is killed.
impl Drop for Run<'_> {
    fn drop(&mut self) {
        self.force_stop_live();
    }
}
