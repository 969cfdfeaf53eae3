use anstyle::Style;

use crate::ui::theme::Theme;

use super::state::RunState;
use super::terminal_text::{display_width, styled_text, truncate_width};
use super::tracker::ProcessTracker;

mod footer;
mod header;
mod panes;

use footer::footer_row;
use header::header_rows;
use panes::output_rows;

/// Border rows plus the header/output separator and the footer line.
pub(super) const RESERVED_ROWS: usize = 4;
/// Two border cells with their padding, the space before the status bar and
/// the space plus glyph of the spinner.
pub(super) const HEADER_RESERVED_CHARS: usize = 7;
const MIN_COLS: usize = 12;

pub(super) struct FrameInput<'a> {
    pub(super) group: &'a str,
    pub(super) trackers: &'a [ProcessTracker],
    pub(super) state: RunState,
    pub(super) pending: usize,
    pub(super) size: (u16, u16),
    pub(super) color: bool,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct Paint {
    color: bool,
    theme: Theme,
}

impl Paint {
    pub(super) fn new(color: bool) -> Self {
        Self {
            color,
            theme: Theme::default(),
        }
    }

    pub(super) fn apply(&self, style: Style, text: &str) -> String {
        if !self.color || text.is_empty() {
            return text.to_owned();
        }
        styled_text(style, text)
    }

    pub(super) fn theme(&self) -> &Theme {
        &self.theme
    }
}

pub(super) fn status_bar_width(cols: usize, title_len: usize) -> usize {
    cols.saturating_sub(title_len + HEADER_RESERVED_CHARS)
}

pub(super) fn output_height(rows: usize, tracker_count: usize) -> usize {
    if tracker_count == 0 {
        return 0;
    }
    (rows.saturating_sub(RESERVED_ROWS + tracker_count) / tracker_count).max(1)
}

pub(super) fn compose_frame(input: &FrameInput<'_>) -> String {
    let cols = (input.size.0 as usize).max(MIN_COLS);
    let rows = input.size.1 as usize;
    let paint = Paint::new(input.color);
    let inner = cols - 4;

    let mut lines = Vec::with_capacity(rows.max(RESERVED_ROWS));
    lines.push(top_border(input.group, cols, &paint));
    lines.extend(header_rows(input.trackers, cols, &paint));
    lines.push(paint.apply(
        paint.theme().muted,
        &format!("├{}┤", "─".repeat(cols - 2)),
    ));
    lines.extend(output_rows(
        input.trackers,
        inner,
        output_height(rows, input.trackers.len()),
        &paint,
    ));
    lines.push(paint.apply(
        paint.theme().muted,
        &format!("╰{}╯", "─".repeat(cols - 2)),
    ));
    lines.push(footer_row(input.state, input.pending, cols, &paint));
    lines.join("\n")
}

fn top_border(group: &str, cols: usize, paint: &Paint) -> String {
    let title = truncate_width(group, cols - 6);
    let fill = cols - 5 - display_width(&title);
    format!(
        "{}{}{}",
        paint.apply(paint.theme().muted, "╭─ "),
        paint.apply(paint.theme().accent, &title),
        paint.apply(paint.theme().muted, &format!(" {}╮", "─".repeat(fill))),
    )
}

pub(super) fn bordered(content: &str, paint: &Paint) -> String {
    let edge = paint.apply(paint.theme().muted, "│");
    format!("{edge} {content} {edge}")
}
