use std::collections::VecDeque;

/// One classified I/O or lifecycle event shown as a cell of the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityMarker {
    Idle,
    Success,
    Warning,
    Error,
    /// Process exit or process-level failure.
    Terminal,
}

impl ActivityMarker {
    pub fn glyph(self) -> char {
        match self {
            ActivityMarker::Idle => '_',
            ActivityMarker::Success
            | ActivityMarker::Warning
            | ActivityMarker::Error
            | ActivityMarker::Terminal => '█',
        }
    }
}

/// Fixed-capacity FIFO of markers, pre-filled with [`ActivityMarker::Idle`].
#[derive(Debug, Clone)]
pub struct ActivityBuffer {
    markers: VecDeque<ActivityMarker>,
    capacity: usize,
    step: usize,
}

impl ActivityBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            markers: std::iter::repeat(ActivityMarker::Idle)
                .take(capacity)
                .collect(),
            capacity,
            step: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    /// Number of markers ever enqueued; drives the spinner animation.
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn enqueue(&mut self, marker: ActivityMarker) {
        self.step = self.step.wrapping_add(1);
        if self.capacity == 0 {
            return;
        }
        self.markers.push_back(marker);
        while self.markers.len() > self.capacity {
            self.markers.pop_front();
        }
    }

    pub fn last(&self) -> Option<ActivityMarker> {
        self.markers.back().copied()
    }

    /// The most recent `width` markers, oldest first.
    pub fn recent(&self, width: usize) -> impl Iterator<Item = ActivityMarker> + '_ {
        let skip = self.markers.len().saturating_sub(width);
        self.markers.iter().skip(skip).copied()
    }

    /// Glyphs of the most recent `width` markers (all of them when `None`).
    pub fn render(&self, width: Option<usize>) -> String {
        let width = width.unwrap_or(self.capacity);
        if width == 0 {
            return String::new();
        }
        self.recent(width).map(ActivityMarker::glyph).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_of_idle_markers_with_zero_step() {
        let buffer = ActivityBuffer::new(5);
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.step(), 0);
        assert_eq!(buffer.render(None), "_____");
    }

    #[test]
    fn enqueue_evicts_oldest_first() {
        let mut buffer = ActivityBuffer::new(3);
        buffer.enqueue(ActivityMarker::Success);
        buffer.enqueue(ActivityMarker::Warning);
        buffer.enqueue(ActivityMarker::Error);
        buffer.enqueue(ActivityMarker::Terminal);
        assert_eq!(buffer.len(), 3);
        assert_eq!(
            buffer.recent(3).collect::<Vec<ActivityMarker>>(),
            vec![
                ActivityMarker::Warning,
                ActivityMarker::Error,
                ActivityMarker::Terminal
            ]
        );
        assert_eq!(buffer.step(), 4);
    }

    #[test]
    fn render_zero_width_is_empty() {
        let mut buffer = ActivityBuffer::new(4);
        buffer.enqueue(ActivityMarker::Success);
        assert_eq!(buffer.render(Some(0)), "");
    }

    #[test]
    fn render_length_is_capped_by_capacity() {
        let mut buffer = ActivityBuffer::new(4);
        buffer.enqueue(ActivityMarker::Success);
        for width in [1usize, 2, 4, 10, 400] {
            assert_eq!(buffer.render(Some(width)).chars().count(), width.min(4));
        }
    }

    #[test]
    fn render_keeps_arrival_order() {
        let mut buffer = ActivityBuffer::new(4);
        buffer.enqueue(ActivityMarker::Success);
        buffer.enqueue(ActivityMarker::Idle);
        assert_eq!(buffer.render(Some(3)), "_█_");
    }
}
