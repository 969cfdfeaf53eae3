use super::{parse_command, CliParseError, Command, ListArgs, RunArgs};
use std::path::PathBuf;

fn args(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[test]
fn parse_defaults_to_help_without_command() {
    let cmd = parse_command(Vec::<String>::new()).expect("parse should succeed");
    assert_eq!(cmd, Command::Help);
}

#[test]
fn parse_help_flags() {
    for flag in ["--help", "-h", "help"] {
        assert_eq!(
            parse_command(args(&[flag])).expect("parse should succeed"),
            Command::Help
        );
    }
    assert_eq!(
        parse_command(args(&["run", "dev", "--help"])).expect("parse should succeed"),
        Command::Help
    );
}

#[test]
fn parse_run_with_file_and_throttle() {
    let cmd = parse_command(args(&[
        "run",
        "--file",
        "/tmp/playbook.toml",
        "dev",
        "--throttle-ms",
        "120",
    ]))
    .expect("parse should succeed");
    assert_eq!(
        cmd,
        Command::Run(RunArgs {
            play: "dev".to_owned(),
            file: Some(PathBuf::from("/tmp/playbook.toml")),
            throttle_ms: Some(120),
        })
    );
}

#[test]
fn parse_run_requires_play() {
    let err = parse_command(args(&["run"])).expect_err("missing play");
    assert_eq!(err, CliParseError::MissingPlay);
    assert_eq!(err.to_string(), "run requires a play name");
}

#[test]
fn parse_run_rejects_second_play_and_bad_throttle() {
    let err = parse_command(args(&["run", "dev", "web"])).expect_err("extra play");
    assert_eq!(err, CliParseError::UnknownArgument("web".to_owned()));

    let err = parse_command(args(&["run", "dev", "--throttle-ms", "fast"]))
        .expect_err("bad throttle");
    assert_eq!(err, CliParseError::InvalidThrottle("fast".to_owned()));

    let err = parse_command(args(&["run", "dev", "--throttle-ms"])).expect_err("no value");
    assert_eq!(err, CliParseError::MissingThrottleValue);
}

#[test]
fn parse_list_with_optional_file() {
    assert_eq!(
        parse_command(args(&["list"])).expect("parse should succeed"),
        Command::List(ListArgs { file: None })
    );
    assert_eq!(
        parse_command(args(&["list", "-f", "plays.json"])).expect("parse should succeed"),
        Command::List(ListArgs {
            file: Some(PathBuf::from("plays.json")),
        })
    );
    assert_eq!(
        parse_command(args(&["list", "--file"])).expect_err("missing value"),
        CliParseError::MissingFileValue
    );
}

#[test]
fn parse_rejects_unknown_command_and_flags() {
    assert_eq!(
        parse_command(args(&["deploy"])).expect_err("unknown command"),
        CliParseError::UnknownCommand("deploy".to_owned())
    );
    assert_eq!(
        parse_command(args(&["list", "--verbose"])).expect_err("unknown flag"),
        CliParseError::UnknownArgument("--verbose".to_owned())
    );
}
