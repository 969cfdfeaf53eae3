use std::time::{Duration, Instant};

use crate::model::Project;
use crate::process_manager::{ExitSummary, OutputStream, ProcessFailure, SpawnedProcess};

use super::activity::{ActivityBuffer, ActivityMarker};
use super::classify::OutputClassifier;
use super::output::OutputBuffer;
use super::palette::TrackerColor;

pub(crate) const SPINNER_FRAMES: [char; 12] =
    ['▁', '▃', '▄', '▅', '▆', '▇', '█', '▇', '▆', '▅', '▄', '▃'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Termination {
    Running,
    /// Graceful signal sent; escalate at `force_at` if still alive.
    Signaled { force_at: Instant },
    Forced,
    /// Already done when cancellation reached it.
    Settled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TerminationStep {
    Graceful,
    Forced,
    /// The leader already exited; kill whatever it left in its process group.
    Sweep,
}

/// Final state of one tracker, handed back when the run completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerReport {
    pub project: String,
    pub display_name: String,
    pub pid: Option<u32>,
    /// Time between run start and the spawn attempt.
    pub started_after: Duration,
    /// Time from spawn until the process finished, or until the report.
    pub runtime: Duration,
    pub exit: Option<ExitSummary>,
    pub failure: Option<ProcessFailure>,
    pub graceful_signal_sent: bool,
    pub forced_signal_sent: bool,
    pub activity: Vec<ActivityMarker>,
    pub output: Vec<String>,
}

pub(crate) struct ProcessTracker {
    /// Position of the project among the group's enabled projects.
    pub(crate) slot: usize,
    pub(crate) project: String,
    pub(crate) display_name: String,
    pub(crate) process: Option<SpawnedProcess>,
    pub(crate) activity: ActivityBuffer,
    pub(crate) output: OutputBuffer,
    pub(crate) color: TrackerColor,
    pub(crate) done: bool,
    pub(crate) terminating: bool,
    termination: Termination,
    graceful_signal_sent: bool,
    forced_signal_sent: bool,
    started_at: Instant,
    ended_at: Option<Instant>,
    started_after: Duration,
    exit: Option<ExitSummary>,
    failure: Option<ProcessFailure>,
}

impl ProcessTracker {
    fn base(
        slot: usize,
        project: &Project,
        display_name: String,
        process: Option<SpawnedProcess>,
        color: TrackerColor,
        capacities: (usize, usize),
        started_after: Duration,
    ) -> Self {
        Self {
            slot,
            project: project.name.clone(),
            display_name,
            process,
            activity: ActivityBuffer::new(capacities.0),
            output: OutputBuffer::new(capacities.1),
            color,
            done: false,
            terminating: false,
            termination: Termination::Running,
            graceful_signal_sent: false,
            forced_signal_sent: false,
            started_at: Instant::now(),
            ended_at: None,
            started_after,
            exit: None,
            failure: None,
        }
    }

    pub(crate) fn spawned(
        slot: usize,
        project: &Project,
        process: SpawnedProcess,
        color: TrackerColor,
        capacities: (usize, usize),
        started_after: Duration,
    ) -> Self {
        let display_name = format!("{} [{}]", project.name, process.pid());
        Self::base(
            slot,
            project,
            display_name,
            Some(process),
            color,
            capacities,
            started_after,
        )
    }

    /// Tracker for a project whose spawn failed; it starts out done.
    pub(crate) fn failed(
        slot: usize,
        project: &Project,
        failure: ProcessFailure,
        color: TrackerColor,
        capacities: (usize, usize),
        started_after: Duration,
    ) -> Self {
        let display_name = format!("{} [?]", project.name);
        let mut tracker = Self::base(
            slot,
            project,
            display_name,
            None,
            color,
            capacities,
            started_after,
        );
        tracker.record_failure(failure);
        tracker
    }

    pub(crate) fn pid(&self) -> Option<u32> {
        self.process.as_ref().map(SpawnedProcess::pid)
    }

    pub(crate) fn elapsed(&self) -> Duration {
        let end = self.ended_at.unwrap_or_else(Instant::now);
        end.saturating_duration_since(self.started_at)
    }

    fn finish(&mut self) {
        self.done = true;
        self.ended_at.get_or_insert_with(Instant::now);
    }

    pub(crate) fn record_output(
        &mut self,
        stream: OutputStream,
        chunk: &str,
        classifier: &dyn OutputClassifier,
    ) {
        if !self.done {
            self.activity.enqueue(classifier.classify(stream, chunk));
        }
        self.output.push(chunk);
    }

    pub(crate) fn record_failure(&mut self, failure: ProcessFailure) {
        self.activity.enqueue(ActivityMarker::Terminal);
        self.output.push(&failure.line());
        if !failure.detail.is_empty() {
            self.output.push(&failure.detail);
        }
        self.failure = Some(failure);
        self.finish();
    }

    pub(crate) fn record_exit(&mut self, exit: ExitSummary) {
        self.activity.enqueue(ActivityMarker::Terminal);
        self.output.push(&exit.line());
        self.exit = Some(exit);
        self.finish();
    }

    /// Appends an idle marker unless the tracker is done.
    pub(crate) fn idle_tick(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.activity.enqueue(ActivityMarker::Idle);
        true
    }

    pub(crate) fn spinner_glyph(&self) -> char {
        if self.done {
            return SPINNER_FRAMES[0];
        }
        SPINNER_FRAMES[self.activity.step() % SPINNER_FRAMES.len()]
    }

    /// Advances this tracker's cancellation sub-state and returns the signal
    /// that has to be sent now, if any.
    pub(crate) fn next_termination_step(
        &mut self,
        now: Instant,
        grace: Duration,
    ) -> Option<TerminationStep> {
        if self.done {
            if self.terminating {
                return None;
            }
            self.terminating = true;
            self.termination = Termination::Settled;
            return self.process.is_some().then_some(TerminationStep::Sweep);
        }
        match self.termination {
            Termination::Running => {
                self.terminating = true;
                self.termination = Termination::Signaled {
                    force_at: now + grace,
                };
                Some(TerminationStep::Graceful)
            }
            Termination::Signaled { force_at } if now >= force_at => {
                self.termination = Termination::Forced;
                Some(TerminationStep::Forced)
            }
            Termination::Signaled { .. } | Termination::Forced | Termination::Settled => None,
        }
    }

    pub(crate) fn note_signal_sent(&mut self, step: TerminationStep) {
        match step {
            TerminationStep::Graceful => self.graceful_signal_sent = true,
            TerminationStep::Forced => self.forced_signal_sent = true,
            TerminationStep::Sweep => {}
        }
    }

    pub(crate) fn report(&self) -> TrackerReport {
        TrackerReport {
            project: self.project.clone(),
            display_name: self.display_name.clone(),
            pid: self.pid(),
            started_after: self.started_after,
            runtime: self.elapsed(),
            exit: self.exit,
            failure: self.failure.clone(),
            graceful_signal_sent: self.graceful_signal_sent,
            forced_signal_sent: self.forced_signal_sent,
            activity: self.activity.recent(self.activity.capacity()).collect(),
            output: self.output.lines().map(str::to_owned).collect(),
        }
    }
}
