pub mod dashboard;
pub mod manifest;
pub mod model;
pub mod process_manager;
pub mod runner;
pub mod ui;

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Run(RunArgs),
    List(ListArgs),
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    pub play: String,
    pub file: Option<PathBuf>,
    pub throttle_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListArgs {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliParseError {
    MissingFileValue,
    MissingThrottleValue,
    InvalidThrottle(String),
    MissingPlay,
    UnknownCommand(String),
    UnknownArgument(String),
}

impl std::fmt::Display for CliParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliParseError::MissingFileValue => write!(f, "--file requires a value"),
            CliParseError::MissingThrottleValue => write!(f, "--throttle-ms requires a value"),
            CliParseError::InvalidThrottle(value) => {
                write!(f, "--throttle-ms expects milliseconds, got `{value}`")
            }
            CliParseError::MissingPlay => write!(f, "run requires a play name"),
            CliParseError::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            CliParseError::UnknownArgument(arg) => write!(f, "unknown argument: {arg}"),
        }
    }
}

impl std::error::Error for CliParseError {}

pub fn parse_command<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(cmd) = args.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "--help" | "-h" | "help" => Ok(Command::Help),
        "run" => parse_run(args),
        "list" => parse_list(args),
        _ => Err(CliParseError::UnknownCommand(cmd)),
    }
}

fn parse_run<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut play: Option<String> = None;
    let mut file: Option<PathBuf> = None;
    let mut throttle_ms: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--file" | "-f" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingFileValue);
                };
                file = Some(PathBuf::from(path));
            }
            "--throttle-ms" => {
                let Some(value) = args.next() else {
                    return Err(CliParseError::MissingThrottleValue);
                };
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| CliParseError::InvalidThrottle(value.clone()))?;
                throttle_ms = Some(parsed);
            }
            "--help" | "-h" => return Ok(Command::Help),
            other if other.starts_with('-') || play.is_some() => {
                return Err(CliParseError::UnknownArgument(other.to_owned()))
            }
            _ => play = Some(arg),
        }
    }

    let Some(play) = play else {
        return Err(CliParseError::MissingPlay);
    };
    Ok(Command::Run(RunArgs {
        play,
        file,
        throttle_ms,
    }))
}

fn parse_list<I>(args: I) -> Result<Command, CliParseError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut file: Option<PathBuf> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--file" | "-f" => {
                let Some(path) = args.next() else {
                    return Err(CliParseError::MissingFileValue);
                };
                file = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(Command::Help),
            other => return Err(CliParseError::UnknownArgument(other.to_owned())),
        }
    }

    Ok(Command::List(ListArgs { file }))
}

pub fn print_usage() {
    eprintln!(
        "pb\n\nUSAGE:\n  pb list [--file <PATH>]\n  pb run <play> [--file <PATH>] [--throttle-ms <MS>]\n\nCOMMANDS:\n  list              List plays defined in the manifest\n  run <play>        Launch every enabled project of a play on a live dashboard\n\nOPTIONS:\n  -f, --file <PATH>     Manifest path (default: ./playbook.toml)\n  --throttle-ms <MS>    Minimum delay between dashboard frames (default: 50)\n\nKEYS (run):\n  q, Ctrl+C         Stop all processes, then press again to exit\n\nENVIRONMENT:\n  PLAYBOOK_COLOR        always | never | auto\n  PLAYBOOK_DIAGNOSTICS  1 to print a runtime trace after the run\n  NO_COLOR              Disable color output\n\nGENERAL:\n  -h, --help        Print help\n"
    );
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
