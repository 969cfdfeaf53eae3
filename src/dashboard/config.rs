use std::io::IsTerminal;
use std::time::Duration;

use crate::ui::theme::{resolve_color_enabled, OutputMode};

pub const DEFAULT_THROTTLE: Duration = Duration::from_millis(50);
pub const DEFAULT_IDLE_TICK: Duration = Duration::from_millis(500);
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(500);
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 200;
pub const DEFAULT_OUTPUT_CAPACITY: usize = 500;
pub const FALLBACK_VIEWPORT: (u16, u16) = (80, 24);

pub(super) const MAX_EVENTS_PER_TICK: usize = 200;
pub(super) const LOOP_WAIT: Duration = Duration::from_millis(20);

/// Where frame dimensions come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewport {
    /// Re-read the controlling terminal size on every frame.
    Terminal,
    Fixed { cols: u16, rows: u16 },
}

impl Viewport {
    pub fn size(self) -> (u16, u16) {
        match self {
            Viewport::Terminal => crossterm::terminal::size()
                .ok()
                .filter(|(cols, rows)| *cols > 0 && *rows > 0)
                .unwrap_or(FALLBACK_VIEWPORT),
            Viewport::Fixed { cols, rows } => (cols, rows),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    pub idle_tick: Duration,
    pub grace_period: Duration,
    pub activity_capacity: usize,
    pub output_capacity: usize,
    pub viewport: Viewport,
    pub color: bool,
    /// Attach to the terminal for keypresses (raw mode for the run).
    pub interactive: bool,
    pub diagnostics: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            idle_tick: DEFAULT_IDLE_TICK,
            grace_period: DEFAULT_GRACE_PERIOD,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            viewport: Viewport::Terminal,
            color: false,
            interactive: false,
            diagnostics: false,
        }
    }
}

impl ManagerConfig {
    /// Interactive terminal defaults, honoring `PLAYBOOK_COLOR`, `NO_COLOR`
    /// and `PLAYBOOK_DIAGNOSTICS`.
    pub fn from_env() -> Self {
        Self {
            color: resolve_color_enabled(OutputMode::from_env(), std::io::stdout().is_terminal()),
            interactive: true,
            diagnostics: diagnostics_enabled_from_env(),
            ..Self::default()
        }
    }

    pub fn with_idle_tick(mut self, idle_tick: Duration) -> Self {
        self.idle_tick = idle_tick;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_capacities(mut self, activity: usize, output: usize) -> Self {
        self.activity_capacity = activity;
        self.output_capacity = output;
        self
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: bool) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

fn diagnostics_enabled_from_env() -> bool {
    std::env::var("PLAYBOOK_DIAGNOSTICS")
        .ok()
        .is_some_and(|value| value == "1" || value.eq_ignore_ascii_case("true"))
}
