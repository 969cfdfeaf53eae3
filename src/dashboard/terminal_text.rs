use std::time::Duration;

use anstyle::Style as AnsiStyle;
use unicode_width::UnicodeWidthChar;

/// Removes CSI and OSC escape sequences plus C0 control bytes other than
/// newline and tab. Tabs become single spaces so column math stays simple.
/// A lone carriage return starts a new line; `\r\n` is a single break.
pub fn strip_terminal_sequences(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0usize;
    while i < chars.len() {
        let ch = chars[i];
        if ch == '\u{1b}' {
            match chars.get(i + 1) {
                Some('[') => {
                    i += 2;
                    while i < chars.len() && !('@'..='~').contains(&chars[i]) {
                        i += 1;
                    }
                }
                Some(']') => {
                    i += 2;
                    while i < chars.len() {
                        if chars[i] == '\u{0007}' {
                            break;
                        }
                        if chars[i] == '\u{1b}' && chars.get(i + 1) == Some(&'\\') {
                            i += 1;
                            break;
                        }
                        i += 1;
                    }
                }
                // Two-byte escapes such as `ESC =` or `ESC 7`.
                Some(_) => i += 1,
                None => {}
            }
        } else if ch == '\t' {
            out.push(' ');
        } else if ch == '\r' {
            if chars.get(i + 1) != Some(&'\n') {
                out.push('\n');
            }
        } else if !is_dropped_control(ch) {
            out.push(ch);
        }
        i += 1;
    }
    out
}

fn is_dropped_control(ch: char) -> bool {
    matches!(
        ch,
        '\u{0000}'..='\u{0008}'
            | '\u{000B}'
            | '\u{000C}'
            | '\u{000E}'..='\u{001A}'
            | '\u{001C}'..='\u{001F}'
            | '\u{007F}'
    )
}

fn char_width(ch: char) -> usize {
    UnicodeWidthChar::width(ch).unwrap_or(0)
}

/// Terminal columns occupied by `text`.
pub(crate) fn display_width(text: &str) -> usize {
    text.chars().map(char_width).sum()
}

/// Longest prefix of `text` that fits in `width` columns. A wide character
/// that would straddle the edge is left out.
pub(crate) fn truncate_width(text: &str, width: usize) -> String {
    let mut used = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let w = char_width(ch);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

/// Truncates or right-pads `text` to exactly `width` columns.
pub(crate) fn fit_width(text: &str, width: usize) -> String {
    let mut fitted = truncate_width(text, width);
    let used = display_width(&fitted);
    fitted.extend(std::iter::repeat(' ').take(width - used));
    fitted
}

pub(crate) fn styled_text(style: AnsiStyle, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs();
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{hours}h{minutes:02}m{secs:02}s")
    } else if minutes > 0 {
        format!("{minutes}m{secs:02}s")
    } else {
        format!("{secs}s")
    }
}
