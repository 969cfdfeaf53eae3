use std::collections::VecDeque;

use super::terminal_text::{fit_width, strip_terminal_sequences};

/// Fixed-capacity FIFO of normalized output lines for one process.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
    capacity: usize,
}

impl OutputBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Strips escape sequences, splits on newlines, right-trims each line and
    /// keeps the ones that are not blank. Returns how many lines were stored.
    pub fn push(&mut self, raw: &str) -> usize {
        let cleaned = strip_terminal_sequences(raw);
        let mut stored = 0usize;
        for line in cleaned.split('\n') {
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }
            self.enqueue(line.to_owned());
            stored += 1;
        }
        stored
    }

    fn enqueue(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        self.lines.push_back(line);
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// The last `height` lines, each fitted to exactly `width` characters.
    pub fn rendered_lines(&self, width: usize, height: usize) -> Vec<String> {
        let height = height.max(1);
        let skip = self.lines.len().saturating_sub(height);
        self.lines
            .iter()
            .skip(skip)
            .map(|line| fit_width(line, width))
            .collect()
    }

    pub fn render(&self, width: usize, height: usize) -> String {
        self.rendered_lines(width, height).join("\n")
    }
}
