use playbook::dashboard::{
    ActivityMarker, KeywordClassifier, ManagerConfig, ManagerError, ProcessManager, RunState,
    RunStatus, RunSummary, Viewport,
};
use playbook::model::{ProcessGroup, Project};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const COLS: u16 = 60;
const ROWS: u16 = 16;

fn config() -> ManagerConfig {
    ManagerConfig::default()
        .with_viewport(Viewport::Fixed {
            cols: COLS,
            rows: ROWS,
        })
        .with_idle_tick(Duration::from_millis(20))
        .with_grace_period(Duration::from_millis(200))
}

fn wait_until<P>(manager: &ProcessManager, what: &str, predicate: P) -> RunStatus
where
    P: Fn(&RunStatus) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let status = manager.status();
        if predicate(&status) {
            return status;
        }
        if Instant::now() > deadline {
            panic!("timed out waiting for {what}; last status {status:?}");
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn stop_and_confirm(manager: &ProcessManager) {
    wait_until(manager, "running", |status| status.state == RunState::Running);
    manager.cancel();
    wait_until(manager, "all stopped", |status| {
        status.state == RunState::Cancelling { all_stopped: true }
    });
    manager.confirm();
}

fn run_with<F>(manager: &ProcessManager, group: &ProcessGroup, control: F) -> (RunSummary, Vec<String>)
where
    F: FnOnce(ProcessManager) + Send + 'static,
{
    let controller = {
        let manager = manager.clone();
        thread::spawn(move || control(manager))
    };
    let mut frames = Vec::new();
    let summary = manager
        .execute(group, |frame| frames.push(frame.to_owned()), Duration::ZERO)
        .expect("run completes");
    controller.join().expect("controller thread");
    (summary, frames)
}

#[test]
fn finished_process_keeps_dashboard_open_until_cancel_and_confirm() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo hi")]);
    let (summary, frames) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        thread::sleep(Duration::from_millis(100));
        assert_eq!(manager.status().state, RunState::Running);
        stop_and_confirm(&manager);
    });

    assert_eq!(summary.group, "demo");
    assert_eq!(summary.trackers.len(), 1);
    let report = &summary.trackers[0];
    assert_eq!(report.project, "a");
    assert_eq!(report.output, vec!["hi", "Process Exit: 0 (none)"]);
    assert!(!report.graceful_signal_sent);
    assert_eq!(report.activity.last(), Some(&ActivityMarker::Terminal));

    assert!(frames.iter().any(|frame| frame.contains("hi")));
    assert!(frames
        .iter()
        .any(|frame| frame.ends_with("press q to stop")));
    let last = frames.last().expect("at least one frame");
    assert!(last.ends_with("all processes stopped · press q to exit"));
    assert_eq!(manager.status().state, RunState::Confirmed);
}

#[test]
fn frames_fill_the_viewport() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo hi")]);
    let (_, frames) = run_with(&manager, &group, |manager| stop_and_confirm(&manager));

    assert!(!frames.is_empty());
    for frame in &frames {
        assert_eq!(frame.split('\n').count(), ROWS as usize);
        assert!(frame.starts_with("╭─ demo "));
    }
}

#[test]
fn display_name_includes_pid() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("api", "echo ok")]);
    let (summary, frames) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    let report = &summary.trackers[0];
    let pid = report.pid.expect("spawned pid");
    assert_eq!(report.display_name, format!("api [{pid}]"));
    assert!(frames
        .iter()
        .any(|frame| frame.contains(&format!("│ api [{pid}]: "))));
}

#[test]
fn disabled_projects_are_never_spawned() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![
            Project::new("a", "echo a"),
            Project::new("b", "echo b").with_enabled(false),
        ],
    );
    let (summary, _) = run_with(&manager, &group, |manager| {
        let status = wait_until(&manager, "process exit", |status| status.done == 1);
        assert_eq!(status.spawned, 1);
        assert_eq!(status.pending, 0);
        stop_and_confirm(&manager);
    });

    let names = summary
        .trackers
        .iter()
        .map(|report| report.project.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["a"]);
}

#[test]
fn start_delay_is_respected() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![Project::new("late", "echo late").with_delay(Duration::from_millis(300))],
    );
    let (summary, frames) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    assert!(summary.trackers[0].started_after >= Duration::from_millis(300));
    assert!(frames
        .iter()
        .any(|frame| frame.ends_with("press q to stop · 1 waiting to start")));
}

#[test]
fn pending_projects_are_dropped_on_cancel() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![
            Project::new("now", "sleep 30"),
            Project::new("later", "echo later").with_delay(Duration::from_secs(30)),
        ],
    );
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "first spawn", |status| {
            status.spawned == 1 && status.pending == 1
        });
        stop_and_confirm(&manager);
        assert_eq!(manager.status().pending, 0);
    });

    assert_eq!(summary.trackers.len(), 1);
    let report = &summary.trackers[0];
    assert_eq!(report.project, "now");
    assert!(report.graceful_signal_sent);
    assert!(!report.forced_signal_sent);
    assert_eq!(
        report.output.last().map(String::as_str),
        Some("Process Exit: none (SIGTERM)")
    );
}

#[test]
fn process_ignoring_sigterm_is_killed_after_grace_period() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![Project::new("stubborn", "sh")
            .with_args(["-c", "trap '' TERM; echo ready; sleep 30"])
            .with_direct_exec(true)],
    );
    let (summary, frames) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "spawn", |status| status.spawned == 1);
        thread::sleep(Duration::from_millis(300));
        manager.cancel();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(
            manager.status().state,
            RunState::Cancelling { all_stopped: false }
        );
        wait_until(&manager, "all stopped", |status| {
            status.state == RunState::Cancelling { all_stopped: true }
        });
        manager.confirm();
    });

    let report = &summary.trackers[0];
    assert!(report.graceful_signal_sent);
    assert!(report.forced_signal_sent);
    assert_eq!(report.output, vec!["ready", "Process Exit: none (SIGKILL)"]);
    assert!(frames.iter().any(|frame| frame
        .ends_with("stopping processes · press q to exit once all have stopped")));
}

#[test]
fn confirm_is_ignored_until_everything_stopped() {
    let manager = ProcessManager::new(config().with_grace_period(Duration::from_secs(1)));
    let group = ProcessGroup::new(
        "demo",
        vec![Project::new("stubborn", "sh")
            .with_args(["-c", "trap '' TERM; echo ready; sleep 30"])
            .with_direct_exec(true)],
    );
    run_with(&manager, &group, |manager| {
        wait_until(&manager, "spawn", |status| status.spawned == 1);
        thread::sleep(Duration::from_millis(200));
        manager.confirm();
        assert_eq!(manager.status().state, RunState::Running);
        manager.cancel();
        manager.confirm();
        assert_eq!(
            manager.status().state,
            RunState::Cancelling { all_stopped: false }
        );
        wait_until(&manager, "all stopped", |status| {
            status.state == RunState::Cancelling { all_stopped: true }
        });
        manager.confirm();
    });
    assert_eq!(manager.status().state, RunState::Confirmed);
}

#[test]
fn second_execute_while_running_is_rejected() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("a", "sleep 30")]);
    let rejected = group.clone();
    run_with(&manager, &group, move |manager| {
        wait_until(&manager, "running", |status| status.state == RunState::Running);
        let err = manager
            .execute(&rejected, |_| {}, Duration::ZERO)
            .expect_err("concurrent run");
        assert!(matches!(err, ManagerError::AlreadyRunning));
        stop_and_confirm(&manager);
    });
}

#[test]
fn cancel_and_confirm_without_a_run_do_nothing() {
    let manager = ProcessManager::new(config());
    manager.cancel();
    manager.confirm();
    assert_eq!(manager.status().state, RunState::Idle);
    assert!(manager.current_run().is_none());
}

#[test]
fn current_run_resolves_for_other_waiters() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo hi")]);
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "running", |status| status.state == RunState::Running);
        let handle = manager.current_run().expect("active run handle");
        assert!(!handle.is_finished());
        assert!(handle.wait_timeout(Duration::from_millis(20)).is_none());
        let waiter = thread::spawn(move || handle.wait());
        stop_and_confirm(&manager);
        let resolved = waiter.join().expect("waiter thread").expect("run result");
        assert_eq!(resolved.group, "demo");
    });

    let handle = manager.current_run().expect("finished run handle");
    assert!(handle.is_finished());
    assert_eq!(handle.wait(), Ok(summary));
}

#[test]
fn manager_runs_again_after_confirmation() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo once")]);
    let (first, _) = run_with(&manager, &group, |manager| stop_and_confirm(&manager));
    let (second, _) = run_with(&manager, &group, |manager| stop_and_confirm(&manager));
    assert_eq!(first.trackers.len(), 1);
    assert_eq!(second.trackers.len(), 1);
    assert_ne!(first.trackers[0].pid, second.trackers[0].pid);
}

#[test]
fn spawn_failure_is_local_to_its_tracker() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![
            Project::new("ghost", "/definitely/not/a/binary").with_direct_exec(true),
            Project::new("ok", "echo fine"),
        ],
    );
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "both done", |status| status.done == 2);
        stop_and_confirm(&manager);
    });

    let ghost = &summary.trackers[0];
    assert_eq!(ghost.display_name, "ghost [?]");
    assert_eq!(ghost.pid, None);
    assert_eq!(ghost.output[0], "Process Error: signal=none code=2");
    assert!(ghost.failure.is_some());
    let ok = &summary.trackers[1];
    assert_eq!(ok.output, vec!["fine", "Process Exit: 0 (none)"]);
}

#[test]
fn stderr_and_keywords_color_the_activity_bar() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![
            Project::new("loud", "echo oops 1>&2"),
            Project::new("warn", "echo 'warning: slow'"),
        ],
    );
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "both done", |status| status.done == 2);
        stop_and_confirm(&manager);
    });

    assert!(summary.trackers[0]
        .activity
        .contains(&ActivityMarker::Error));
    assert!(summary.trackers[1]
        .activity
        .contains(&ActivityMarker::Warning));
}

#[test]
fn custom_classifier_is_used() {
    let classifier = KeywordClassifier::new(&["kaboom"], &[]).expect("valid patterns");
    let manager = ProcessManager::new(config()).with_classifier(Arc::new(classifier));
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo kaboom")]);
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    assert!(summary.trackers[0]
        .activity
        .contains(&ActivityMarker::Error));
}

#[test]
fn output_buffer_keeps_only_the_latest_lines() {
    let manager = ProcessManager::new(config().with_capacities(200, 3));
    let group = ProcessGroup::new("demo", vec![Project::new("count", "seq 1 10")]);
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    assert_eq!(
        summary.trackers[0].output,
        vec!["9", "10", "Process Exit: 0 (none)"]
    );
}

#[test]
fn ansi_sequences_are_stripped_from_output() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![Project::new("color", "printf '\\033[31mred\\033[0m\\n'")],
    );
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "process exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    assert_eq!(summary.trackers[0].output[0], "red");
}

#[test]
fn diagnostics_are_collected_when_enabled() {
    let manager = ProcessManager::new(config().with_diagnostics(true));
    let group = ProcessGroup::new("demo", vec![Project::new("a", "echo hi")]);
    let (summary, _) = run_with(&manager, &group, |manager| stop_and_confirm(&manager));

    assert!(!summary.diagnostics.is_empty());
    assert!(summary
        .diagnostics
        .iter()
        .any(|line| line.contains("spawn process=a pid ")));
}

fn is_alive(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map(|rest| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

#[test]
fn cancel_kills_background_children_of_an_exited_process() {
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new("demo", vec![Project::new("bg", "sleep 30 & echo $!")]);
    let (summary, _) = run_with(&manager, &group, |manager| {
        wait_until(&manager, "leader exit", |status| status.done == 1);
        stop_and_confirm(&manager);
    });

    let report = &summary.trackers[0];
    assert_eq!(report.output.last().map(String::as_str), Some("Process Exit: 0 (none)"));
    assert!(!report.graceful_signal_sent);
    assert!(!report.forced_signal_sent);
    let orphan = report.output[0].parse::<u32>().expect("background pid");
    let deadline = Instant::now() + Duration::from_secs(5);
    while is_alive(orphan) {
        assert!(Instant::now() < deadline, "background sleep {orphan} survived the run");
        thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn frames_are_throttled_and_the_last_state_wins() {
    let throttle = Duration::from_millis(200);
    let manager = ProcessManager::new(config());
    let group = ProcessGroup::new(
        "demo",
        vec![Project::new(
            "chatty",
            "for i in $(seq 50); do echo $i; sleep 0.01; done",
        )],
    );
    let controller = {
        let manager = manager.clone();
        thread::spawn(move || {
            wait_until(&manager, "chatty exit", |status| status.done == 1);
            thread::sleep(Duration::from_millis(400));
            stop_and_confirm(&manager);
        })
    };
    let mut frames: Vec<(Instant, String)> = Vec::new();
    manager
        .execute(
            &group,
            |frame| frames.push((Instant::now(), frame.to_owned())),
            throttle,
        )
        .expect("run completes");
    controller.join().expect("controller thread");

    assert!(frames.len() >= 2);
    for pair in frames.windows(2) {
        let gap = pair[1].0.duration_since(pair[0].0);
        assert!(
            gap + Duration::from_millis(10) >= throttle,
            "frames only {gap:?} apart"
        );
    }

    let settled = frames
        .iter()
        .map(|(_, frame)| frame)
        .find(|frame| frame.contains("Process Exit: 0 (none)"))
        .expect("frame after the process went quiet");
    assert!(settled
        .split('\n')
        .any(|row| row.trim_matches(|c| c == '│' || c == ' ') == "50"));
}
