use crate::dashboard::tracker::ProcessTracker;

use super::Paint;

/// `height` bordered rows per tracker from its output buffer, top-aligned and
/// padded with blank rows. The left border carries the tracker color.
pub(super) fn output_rows(
    trackers: &[ProcessTracker],
    inner: usize,
    height: usize,
    paint: &Paint,
) -> Vec<String> {
    let right = paint.apply(paint.theme().muted, "│");
    let blank = " ".repeat(inner);
    let mut rows = Vec::with_capacity(trackers.len() * height);
    for tracker in trackers {
        let left = paint.apply(tracker.color.fg, "│");
        let lines = tracker.output.rendered_lines(inner, height);
        let filler = height.saturating_sub(lines.len());
        for line in lines
            .iter()
            .map(String::as_str)
            .chain(std::iter::repeat(blank.as_str()).take(filler))
        {
            rows.push(format!("{left} {} {right}", paint.apply(tracker.color.fg, line)));
        }
    }
    rows
}
