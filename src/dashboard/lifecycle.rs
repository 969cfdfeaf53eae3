use std::io::{self, Stdout, Write};
use std::time::Duration;

use crossterm::cursor::{Hide, MoveTo, Show};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, is_raw_mode_enabled, Clear, ClearType, DisableLineWrap,
    EnableLineWrap, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::{execute, queue};

/// Exclusive hold on the interactive input stream for one run. Raw mode is
/// switched on if needed and the previous mode comes back on release or drop.
#[derive(Debug)]
pub struct InputSession {
    restore_cooked: bool,
    released: bool,
}

impl InputSession {
    pub fn acquire() -> io::Result<Self> {
        let was_raw = is_raw_mode_enabled()?;
        if !was_raw {
            enable_raw_mode()?;
        }
        Ok(Self {
            restore_cooked: !was_raw,
            released: false,
        })
    }

    /// Waits up to `wait` for a keypress and returns it when it is a stop key.
    pub(crate) fn poll_stop_key(&mut self, wait: Duration) -> io::Result<Option<KeyEvent>> {
        if !event::poll(wait)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) if is_stop_key(&key) => Ok(Some(key)),
            _ => Ok(None),
        }
    }

    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        self.restore()
    }

    fn restore(&self) -> io::Result<()> {
        if self.restore_cooked {
            disable_raw_mode()?;
        }
        Ok(())
    }
}

impl Drop for InputSession {
    fn drop(&mut self) {
        if !self.released {
            let _ = self.restore();
        }
    }
}

/// `q`, `Q` and Ctrl+C request cancellation or confirm exit. Raw mode turns
/// Ctrl+C into a plain key, so it has to be handled here.
pub(crate) fn is_stop_key(key: &KeyEvent) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('C') => key.modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Char('Q') => !key.modifiers.contains(KeyModifiers::CONTROL),
        _ => false,
    }
}

/// Alternate-screen painter for composed frames. Leaves the alternate screen
/// on drop.
pub struct TerminalScreen {
    out: Stdout,
    active: bool,
}

impl TerminalScreen {
    pub fn enter() -> io::Result<Self> {
        let mut out = io::stdout();
        execute!(out, EnterAlternateScreen, DisableLineWrap, Hide)?;
        Ok(Self { out, active: true })
    }

    pub fn paint(&mut self, frame: &str) -> io::Result<()> {
        for (row, line) in frame.split('\n').enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            queue!(
                self.out,
                MoveTo(0, row),
                Print(line),
                Clear(ClearType::UntilNewLine)
            )?;
        }
        queue!(self.out, Clear(ClearType::FromCursorDown))?;
        self.out.flush()
    }

    pub fn leave(mut self) -> io::Result<()> {
        self.active = false;
        execute!(self.out, Show, EnableLineWrap, LeaveAlternateScreen)
    }
}

impl Drop for TerminalScreen {
    fn drop(&mut self) {
        if self.active {
            let _ = execute!(self.out, Show, EnableLineWrap, LeaveAlternateScreen);
        }
    }
}
