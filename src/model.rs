use std::path::PathBuf;
use std::time::Duration;

/// One launchable unit of a [`ProcessGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub working_dir: Option<PathBuf>,
    pub command: String,
    pub args: Vec<String>,
    pub enabled: bool,
    pub delay: Duration,
    /// Execute `command` directly with `args` as an argument vector instead of
    /// handing the joined command line to `sh -c`.
    pub direct_exec: bool,
}

impl Project {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            working_dir: None,
            command: command.into(),
            args: Vec::new(),
            enabled: true,
            delay: Duration::ZERO,
            direct_exec: false,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_direct_exec(mut self, direct_exec: bool) -> Self {
        self.direct_exec = direct_exec;
        self
    }

    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            return self.command.clone();
        }
        format!("{} {}", self.command, self.args.join(" "))
    }
}

/// A named set of projects launched together. Order only affects display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessGroup {
    pub name: String,
    pub projects: Vec<Project>,
}

impl ProcessGroup {
    pub fn new(name: impl Into<String>, projects: Vec<Project>) -> Self {
        Self {
            name: name.into(),
            projects,
        }
    }

    pub fn enabled_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|project| project.enabled)
    }
}
