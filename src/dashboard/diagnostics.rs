use std::collections::VecDeque;
use std::time::Instant;

const MAX_TRACE_LINES: usize = 64;

/// Opt-in trace of what the run did. Disabled instances record nothing.
#[derive(Debug, Clone)]
pub(super) struct RuntimeDiagnostics {
    enabled: bool,
    started_at: Instant,
    frame_count: usize,
    keypress_count: usize,
    output_chunks: usize,
    signals_sent: usize,
    traces: VecDeque<String>,
}

impl RuntimeDiagnostics {
    pub(super) fn new(enabled: bool) -> Self {
        Self {
            enabled,
            started_at: Instant::now(),
            frame_count: 0,
            keypress_count: 0,
            output_chunks: 0,
            signals_sent: 0,
            traces: VecDeque::new(),
        }
    }

    pub(super) fn record_frame(&mut self) {
        if !self.enabled {
            return;
        }
        self.frame_count = self.frame_count.saturating_add(1);
    }

    pub(super) fn record_keypress(&mut self, key: &str) {
        if !self.enabled {
            return;
        }
        self.keypress_count = self.keypress_count.saturating_add(1);
        self.push_trace(format!("key {key}"));
    }

    pub(super) fn record_output_chunk(&mut self, process: &str, size: usize) {
        if !self.enabled {
            return;
        }
        self.output_chunks = self.output_chunks.saturating_add(1);
        if self.output_chunks <= 8 {
            self.push_trace(format!("output process={process} bytes={size}"));
        }
    }

    pub(super) fn record_spawn(&mut self, process: &str, outcome: &str) {
        if !self.enabled {
            return;
        }
        self.push_trace(format!("spawn process={process} {outcome}"));
    }

    pub(super) fn record_signal(&mut self, process: &str, signal: &str, outcome: &str) {
        if !self.enabled {
            return;
        }
        self.signals_sent = self.signals_sent.saturating_add(1);
        self.push_trace(format!("signal process={process} {signal} {outcome}"));
    }

    pub(super) fn record_exit(&mut self, process: &str, payload: &str) {
        if !self.enabled {
            return;
        }
        self.push_trace(format!("exit process={process} {payload}"));
    }

    pub(super) fn record_transition(&mut self, state: &str) {
        if !self.enabled {
            return;
        }
        self.push_trace(format!("state {state}"));
    }

    /// Trace lines followed by a counter summary; empty when disabled.
    pub(super) fn into_lines(self) -> Vec<String> {
        if !self.enabled {
            return Vec::new();
        }
        let mut lines = self.traces.into_iter().collect::<Vec<String>>();
        lines.push(format!(
            "elapsed={}ms frames={} keys={} chunks={} signals={}",
            self.started_at.elapsed().as_millis(),
            self.frame_count,
            self.keypress_count,
            self.output_chunks,
            self.signals_sent
        ));
        lines
    }

    fn push_trace(&mut self, line: String) {
        let stamped = format!("+{}ms {line}", self.started_at.elapsed().as_millis());
        self.traces.push_back(stamped);
        while self.traces.len() > MAX_TRACE_LINES {
            self.traces.pop_front();
        }
    }
}
