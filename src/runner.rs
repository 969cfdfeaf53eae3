use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

use crate::dashboard::{
    format_elapsed, ManagerConfig, ManagerError, ProcessManager, RunSummary, TerminalScreen,
    TrackerReport, DEFAULT_THROTTLE,
};
use crate::manifest::{ManifestError, Playbook, DEFAULT_MANIFEST_FILE};
use crate::ui::theme::resolve_color_enabled;
use crate::ui::{
    KeyValue, NoticeLevel, OutputMode, PlainRenderer, Renderer, SummaryCounts, TableSpec,
};
use crate::{Command, ListArgs, RunArgs};

#[derive(Debug)]
pub enum RunnerError {
    Cwd(std::io::Error),
    Manifest(ManifestError),
    Ui(String),
    EmptyPlay { play: String },
    NotInteractive,
    Terminal(std::io::Error),
    Manager(ManagerError),
}

impl std::fmt::Display for RunnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunnerError::Cwd(error) => write!(f, "failed to read current directory: {error}"),
            RunnerError::Manifest(error) => write!(f, "{error}"),
            RunnerError::Ui(error) => write!(f, "failed to render output: {error}"),
            RunnerError::EmptyPlay { play } => {
                write!(f, "play `{play}` has no enabled projects")
            }
            RunnerError::NotInteractive => {
                write!(f, "`pb run` needs an interactive terminal on stdin and stdout")
            }
            RunnerError::Terminal(error) => write!(f, "failed to prepare terminal: {error}"),
            RunnerError::Manager(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for RunnerError {}

impl From<ManifestError> for RunnerError {
    fn from(value: ManifestError) -> Self {
        Self::Manifest(value)
    }
}

impl From<ManagerError> for RunnerError {
    fn from(value: ManagerError) -> Self {
        Self::Manager(value)
    }
}

impl From<crate::ui::UiError> for RunnerError {
    fn from(value: crate::ui::UiError) -> Self {
        Self::Ui(value.to_string())
    }
}

pub fn run_command(cmd: Command) -> Result<String, RunnerError> {
    match cmd {
        Command::Help => Ok(String::new()),
        Command::List(args) => run_list(args),
        Command::Run(args) => run_play(args),
    }
}

fn manifest_path(file: Option<PathBuf>) -> Result<PathBuf, RunnerError> {
    match file {
        Some(path) => Ok(path),
        None => Ok(std::env::current_dir()
            .map_err(RunnerError::Cwd)?
            .join(DEFAULT_MANIFEST_FILE)),
    }
}

fn stdout_color_enabled() -> bool {
    resolve_color_enabled(OutputMode::from_env(), std::io::stdout().is_terminal())
}

fn into_output(renderer: PlainRenderer<Vec<u8>>) -> Result<String, RunnerError> {
    String::from_utf8(renderer.into_inner())
        .map_err(|error| RunnerError::Ui(format!("invalid utf-8 in rendered output: {error}")))
}

pub fn run_list(args: ListArgs) -> Result<String, RunnerError> {
    let path = manifest_path(args.file)?;
    let playbook = Playbook::load(&path)?;
    render_play_list(&playbook, stdout_color_enabled())
}

pub(crate) fn render_play_list(playbook: &Playbook, color: bool) -> Result<String, RunnerError> {
    let mut renderer = PlainRenderer::new(Vec::<u8>::new(), color);
    renderer.section("Plays")?;
    renderer.key_values(&[
        KeyValue::new("manifest", playbook.path.display().to_string()),
        KeyValue::new("plays", playbook.plays.len().to_string()),
    ])?;
    renderer.text("")?;

    if playbook.plays.is_empty() {
        renderer.notice(NoticeLevel::Warning, "no plays defined")?;
        return into_output(renderer);
    }

    let rows = playbook
        .plays
        .iter()
        .map(|play| {
            let enabled = play
                .enabled_projects()
                .map(|project| project.name.as_str())
                .collect::<Vec<&str>>();
            vec![
                play.name.clone(),
                format!("{}/{}", enabled.len(), play.projects.len()),
                if enabled.is_empty() {
                    "-".to_owned()
                } else {
                    enabled.join(", ")
                },
            ]
        })
        .collect::<Vec<Vec<String>>>();
    renderer.table(&TableSpec::new(
        vec!["play".to_owned(), "enabled".to_owned(), "projects".to_owned()],
        rows,
    ))?;
    into_output(renderer)
}

pub fn run_play(args: RunArgs) -> Result<String, RunnerError> {
    let path = manifest_path(args.file)?;
    let playbook = Playbook::load(&path)?;
    let group = playbook.play(&args.play)?;
    if group.enabled_projects().next().is_none() {
        return Err(RunnerError::EmptyPlay {
            play: group.name.clone(),
        });
    }
    if !std::io::stdin().is_terminal() || !std::io::stdout().is_terminal() {
        return Err(RunnerError::NotInteractive);
    }

    let throttle = args
        .throttle_ms
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_THROTTLE);
    let manager = ProcessManager::new(ManagerConfig::from_env());

    let mut screen = TerminalScreen::enter().map_err(RunnerError::Terminal)?;
    let mut paint_error: Option<std::io::Error> = None;
    let result = manager.execute(
        group,
        |frame| {
            if paint_error.is_none() {
                paint_error = screen.paint(frame).err();
            }
        },
        throttle,
    );
    let mut warnings = Vec::new();
    if let Some(error) = paint_error {
        warnings.push(format!("failed to paint dashboard: {error}"));
    }
    if let Err(error) = screen.leave() {
        warnings.push(format!("failed to leave alternate screen: {error}"));
    }

    let summary = result?;
    render_run_summary(&summary, &warnings, stdout_color_enabled())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Ok,
    Stopped,
    Failed,
}

fn outcome(report: &TrackerReport) -> Outcome {
    if report.failure.is_some() {
        return Outcome::Failed;
    }
    match report.exit {
        Some(exit) if exit.success() => Outcome::Ok,
        Some(exit) if exit.signal.is_some() || report.graceful_signal_sent => Outcome::Stopped,
        _ => Outcome::Failed,
    }
}

fn report_line(report: &TrackerReport) -> String {
    let status = match (&report.failure, report.exit) {
        (Some(failure), _) => failure.line(),
        (None, Some(exit)) => exit.line(),
        (None, None) => "no exit recorded".to_owned(),
    };
    let mut line = format!("{status} after {}", format_elapsed(report.runtime));
    if report.forced_signal_sent {
        line.push_str(" (killed)");
    } else if report.graceful_signal_sent {
        line.push_str(" (stopped)");
    }
    line
}

pub(crate) fn render_run_summary(
    summary: &RunSummary,
    warnings: &[String],
    color: bool,
) -> Result<String, RunnerError> {
    let mut renderer = PlainRenderer::new(Vec::<u8>::new(), color);
    renderer.section("Process Results")?;
    renderer.key_values(&[KeyValue::new("play", summary.group.clone())])?;
    renderer.key_values(
        &summary
            .trackers
            .iter()
            .map(|report| KeyValue::new(report.display_name.clone(), report_line(report)))
            .collect::<Vec<KeyValue>>(),
    )?;

    let mut counts = SummaryCounts {
        ok: 0,
        stopped: 0,
        failed: 0,
    };
    for report in &summary.trackers {
        match outcome(report) {
            Outcome::Ok => counts.ok += 1,
            Outcome::Stopped => counts.stopped += 1,
            Outcome::Failed => counts.failed += 1,
        }
    }
    renderer.text("")?;
    renderer.summary(counts)?;

    for warning in warnings.iter().chain(summary.restore_warning.iter()) {
        renderer.notice(NoticeLevel::Warning, warning)?;
    }
    if !summary.diagnostics.is_empty() {
        renderer.text("")?;
        renderer.bullet_list("diagnostics", &summary.diagnostics)?;
    }
    into_output(renderer)
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
