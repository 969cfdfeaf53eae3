use anstyle::{AnsiColor, Color, Style};

const FOREGROUND: [AnsiColor; 6] = [
    AnsiColor::Magenta,
    AnsiColor::Cyan,
    AnsiColor::Green,
    AnsiColor::Yellow,
    AnsiColor::Red,
    AnsiColor::Blue,
];

const BACKGROUND: [AnsiColor; 6] = [
    AnsiColor::Blue,
    AnsiColor::Magenta,
    AnsiColor::Cyan,
    AnsiColor::Green,
    AnsiColor::Yellow,
    AnsiColor::Red,
];

/// Display colors assigned to one tracker for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerColor {
    pub fg: Style,
    pub bg: Style,
}

/// Per-run color rotation, chosen once when a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunPalette {
    offset: usize,
}

impl RunPalette {
    pub fn with_offset(offset: usize) -> Self {
        Self {
            offset: offset % FOREGROUND.len(),
        }
    }

    pub fn random() -> Self {
        Self::with_offset(rand::random::<usize>())
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn color_for(&self, index: usize) -> TrackerColor {
        let slot = (index + self.offset) % FOREGROUND.len();
        TrackerColor {
            fg: Style::new().fg_color(Some(Color::Ansi(FOREGROUND[slot]))),
            bg: Style::new()
                .bg_color(Some(Color::Ansi(BACKGROUND[slot])))
                .fg_color(Some(Color::Ansi(AnsiColor::BrightWhite))),
        }
    }
}
