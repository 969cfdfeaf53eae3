use std::fs;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const MANIFEST: &str = r#"
[plays.dev]

[[plays.dev.projects]]
name = "api"
command = "printf api"

[[plays.dev.projects]]
name = "web"
command = "printf web"
delay_ms = 250
enabled = false

[plays.docs]

[[plays.docs.projects]]
name = "book"
command = "printf book"
"#;

#[test]
fn cli_list_no_color_output_has_no_ansi_sequences() {
    let root = temp_workspace("cli-no-color");
    let manifest = root.join("playbook.toml");
    fs::write(&manifest, MANIFEST).expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("list")
        .arg("--file")
        .arg(&manifest)
        .env("NO_COLOR", "1")
        .env("PLAYBOOK_COLOR", "always")
        .output()
        .expect("run pb");

    assert!(
        output.status.success(),
        "stdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("Plays"));
    assert!(stdout.contains(&manifest.display().to_string()));
    assert!(stdout.contains("plays: 2"));
    let dev = stdout
        .lines()
        .find(|line| line.starts_with("dev"))
        .expect("dev row");
    assert!(dev.contains("1/2"));
    assert!(stdout.lines().any(|line| line.starts_with("docs")));
    assert!(!stdout.contains('\u{1b}'));
}

#[test]
fn cli_list_defaults_to_playbook_toml_in_cwd() {
    let root = temp_workspace("cli-default-file");
    fs::write(root.join("playbook.toml"), MANIFEST).expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("list")
        .current_dir(&root)
        .env("NO_COLOR", "1")
        .output()
        .expect("run pb");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("plays: 2"));
}

#[test]
fn cli_list_supports_colorized_output_when_forced() {
    let root = temp_workspace("cli-color-list");
    let manifest = root.join("playbook.toml");
    fs::write(&manifest, MANIFEST).expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("list")
        .arg("-f")
        .arg(&manifest)
        .env("PLAYBOOK_COLOR", "always")
        .env_remove("NO_COLOR")
        .output()
        .expect("run pb");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    assert!(stdout.contains("Plays"));
    assert!(stdout.contains('\u{1b}'));
}

#[test]
fn cli_parse_error_includes_usage_in_stderr() {
    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("run")
        .arg("--file")
        .env("NO_COLOR", "1")
        .output()
        .expect("run pb");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("[error] Invalid command arguments"));
    assert!(stderr.contains("--file requires a value"));
    assert!(stderr.contains("USAGE:"));
    assert!(!stderr.contains('\u{1b}'));
}

#[test]
fn cli_help_prints_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("--help")
        .output()
        .expect("run pb");

    assert!(output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("pb run <play>"));
    assert!(stderr.contains("PLAYBOOK_COLOR"));
}

#[test]
fn cli_run_unknown_play_fails_with_available_names() {
    let root = temp_workspace("cli-unknown-play");
    let manifest = root.join("playbook.toml");
    fs::write(&manifest, MANIFEST).expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("run")
        .arg("prod")
        .arg("--file")
        .arg(&manifest)
        .env("NO_COLOR", "1")
        .output()
        .expect("run pb");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("[error] Command failed"));
    assert!(stderr.contains("play `prod` not found"));
    assert!(stderr.contains("available: dev, docs"));
}

#[test]
fn cli_run_requires_an_interactive_terminal() {
    let root = temp_workspace("cli-no-tty");
    let manifest = root.join("playbook.toml");
    fs::write(&manifest, MANIFEST).expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("run")
        .arg("dev")
        .arg("--file")
        .arg(&manifest)
        .stdin(Stdio::null())
        .env("NO_COLOR", "1")
        .output()
        .expect("run pb");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("needs an interactive terminal"));
}

#[test]
fn cli_run_rejects_play_without_enabled_projects() {
    let root = temp_workspace("cli-empty-play");
    let manifest = root.join("playbook.toml");
    fs::write(
        &manifest,
        "[plays.off]\n[[plays.off.projects]]\nname = \"a\"\ncommand = \"true\"\nenabled = false\n",
    )
    .expect("write manifest");

    let output = Command::new(env!("CARGO_BIN_EXE_pb"))
        .arg("run")
        .arg("off")
        .arg("--file")
        .arg(&manifest)
        .stdin(Stdio::null())
        .env("NO_COLOR", "1")
        .output()
        .expect("run pb");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("utf8 stderr");
    assert!(stderr.contains("play `off` has no enabled projects"));
}

fn temp_workspace(name: &str) -> PathBuf {
    let ts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    let root = std::env::temp_dir().join(format!("playbook-cli-{name}-{ts}"));
    fs::create_dir_all(&root).expect("mkdir workspace");
    root
}
