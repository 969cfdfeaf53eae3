use anstyle::Style;

use crate::dashboard::activity::{ActivityBuffer, ActivityMarker};
use crate::dashboard::terminal_text::{display_width, truncate_width};
use crate::dashboard::tracker::ProcessTracker;
use crate::ui::theme::Theme;

use super::{bordered, status_bar_width, Paint};

/// One row per tracker: padded name, activity bar and spinner.
pub(super) fn header_rows(trackers: &[ProcessTracker], cols: usize, paint: &Paint) -> Vec<String> {
    let inner = cols - 4;
    let name_width = trackers
        .iter()
        .map(|tracker| display_width(&tracker.display_name))
        .max()
        .unwrap_or(0)
        .min(inner.saturating_sub(3));
    let title_len = name_width + 1;
    let bar_width = status_bar_width(cols, title_len);

    trackers
        .iter()
        .map(|tracker| {
            let name = truncate_width(&tracker.display_name, name_width);
            let pad = name_width - display_width(&name);
            let name_style = if tracker.terminating && !tracker.done {
                tracker.color.bg
            } else {
                tracker.color.fg
            };
            let mut row = format!("{}{}:", " ".repeat(pad), paint.apply(name_style, &name));
            let mut visible = title_len;
            if bar_width > 0 {
                let bar = activity_bar(&tracker.activity, bar_width, paint);
                row.push(' ');
                row.push_str(&bar.0);
                visible += 1 + bar.1;
            }
            row.push(' ');
            row.push_str(&paint.apply(tracker.color.fg, &tracker.spinner_glyph().to_string()));
            visible += 2;
            row.push_str(&" ".repeat(inner.saturating_sub(visible)));
            bordered(&row, paint)
        })
        .collect()
}

/// Styled bar of the latest markers and its visible width. Runs of equal
/// markers share one escape sequence.
fn activity_bar(buffer: &ActivityBuffer, width: usize, paint: &Paint) -> (String, usize) {
    let mut out = String::new();
    let mut run: Option<(ActivityMarker, String)> = None;
    let mut visible = 0usize;
    for marker in buffer.recent(width) {
        visible += 1;
        match run.as_mut() {
            Some((current, text)) if *current == marker => text.push(marker.glyph()),
            _ => {
                if let Some((current, text)) = run.take() {
                    out.push_str(&paint.apply(marker_style(paint.theme(), current), &text));
                }
                run = Some((marker, marker.glyph().to_string()));
            }
        }
    }
    if let Some((current, text)) = run {
        out.push_str(&paint.apply(marker_style(paint.theme(), current), &text));
    }
    (out, visible)
}

fn marker_style(theme: &Theme, marker: ActivityMarker) -> Style {
    match marker {
        ActivityMarker::Idle | ActivityMarker::Terminal => theme.muted,
        ActivityMarker::Success => theme.success,
        ActivityMarker::Warning => theme.warning,
        ActivityMarker::Error => theme.error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dashboard::terminal_text::strip_terminal_sequences;

    #[test]
    fn activity_bar_groups_runs_of_markers() {
        let mut buffer = ActivityBuffer::new(6);
        buffer.enqueue(ActivityMarker::Success);
        buffer.enqueue(ActivityMarker::Success);
        buffer.enqueue(ActivityMarker::Error);

        let (plain, width) = activity_bar(&buffer, 4, &Paint::new(false));
        assert_eq!(plain, "_███");
        assert_eq!(width, 4);

        let (colored, _) = activity_bar(&buffer, 4, &Paint::new(true));
        assert!(colored.contains('\u{1b}'));
        assert_eq!(strip_terminal_sequences(&colored), "_███");
    }
}
