use std::io::{ErrorKind, Read};
#[cfg(unix)]
use std::os::unix::process::CommandExt;
#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{Child, Command as ProcessCommand, ExitStatus, Stdio};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::{setpgid, Pid};

use crate::model::Project;

const READ_CHUNK_BYTES: usize = 4096;
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(40);
const OUTPUT_DRAIN_WINDOW: Duration = Duration::from_millis(250);
const OUTPUT_DRAIN_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEventKind {
    Output { stream: OutputStream, chunk: String },
    Error(ProcessFailure),
    Exit(ExitSummary),
}

/// Lifecycle or I/O event of one spawned process, addressed by tracker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEvent {
    pub tracker: usize,
    pub kind: ProcessEventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ExitSummary {
    pub fn from_status(status: ExitStatus) -> Self {
        #[cfg(unix)]
        {
            Self {
                code: status.code(),
                signal: status.signal(),
            }
        }
        #[cfg(not(unix))]
        {
            Self {
                code: status.code(),
                signal: None,
            }
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Synthetic output line recorded when the process exits.
    pub fn line(&self) -> String {
        let code = self
            .code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_owned());
        format!("Process Exit: {code} ({})", signal_label(self.signal))
    }

    pub fn diagnostic(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("exit={code}"),
            (None, Some(signal)) => format!("signal={signal}"),
            (None, None) => "exit=unknown".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessFailure {
    pub code: Option<i32>,
    pub signal: Option<i32>,
    pub detail: String,
}

impl ProcessFailure {
    pub fn from_io(error: &std::io::Error) -> Self {
        Self {
            code: error.raw_os_error(),
            signal: None,
            detail: error.to_string(),
        }
    }

    pub fn line(&self) -> String {
        let code = self
            .code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "none".to_owned());
        format!(
            "Process Error: signal={} code={code}",
            signal_label(self.signal)
        )
    }
}

fn signal_label(signal: Option<i32>) -> String {
    let Some(signal) = signal else {
        return "none".to_owned();
    };
    #[cfg(unix)]
    {
        if let Ok(named) = Signal::try_from(signal) {
            return named.as_str().to_owned();
        }
    }
    signal.to_string()
}

#[derive(Debug)]
pub enum ProcessManagerError {
    Spawn {
        process: String,
        command: String,
        error: std::io::Error,
    },
    MissingStdio {
        process: String,
    },
    Signal {
        pid: u32,
        detail: String,
    },
}

impl std::fmt::Display for ProcessManagerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessManagerError::Spawn {
                process,
                command,
                error,
            } => write!(
                f,
                "failed to spawn process `{process}` with command `{command}`: {error}"
            ),
            ProcessManagerError::MissingStdio { process } => {
                write!(f, "process `{process}` missing stdout/stderr pipe")
            }
            ProcessManagerError::Signal { pid, detail } => {
                write!(f, "failed to signal process group {pid}: {detail}")
            }
        }
    }
}

impl std::error::Error for ProcessManagerError {}

impl ProcessManagerError {
    /// Failure record for a tracker whose spawn attempt returned this error.
    pub fn failure(&self) -> ProcessFailure {
        match self {
            ProcessManagerError::Spawn { error, .. } => ProcessFailure::from_io(error),
            other => ProcessFailure {
                code: None,
                signal: None,
                detail: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    /// SIGTERM to the process group.
    Graceful,
    /// SIGKILL to the process group.
    Forced,
}

/// Handle to a running child. Cloning shares the same child.
#[derive(Debug, Clone)]
pub struct SpawnedProcess {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

impl SpawnedProcess {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// True once the child has been reaped. The exit watcher reaps it, so this
    /// only reads the cached status in the common case.
    pub fn has_exited(&self) -> bool {
        self.child
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_wait()
            .map(|status| status.is_some())
            .unwrap_or(true)
    }

    pub fn signal(&self, signal: TerminationSignal) -> Result<(), ProcessManagerError> {
        #[cfg(unix)]
        {
            let raw = match signal {
                TerminationSignal::Graceful => Signal::SIGTERM,
                TerminationSignal::Forced => Signal::SIGKILL,
            };
            signal_process_group(self.pid, raw)
        }
        #[cfg(not(unix))]
        {
            let _ = signal;
            let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
            match child.kill() {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == ErrorKind::InvalidInput => Ok(()),
                Err(error) => Err(ProcessManagerError::Signal {
                    pid: self.pid,
                    detail: error.to_string(),
                }),
            }
        }
    }
}

/// Spawns `project` and starts the helper threads forwarding its output and
/// exit to `events`. Returns once the child is running.
pub fn spawn_process(
    tracker: usize,
    project: &Project,
    events: &Sender<ProcessEvent>,
) -> Result<SpawnedProcess, ProcessManagerError> {
    let mut command = build_command(project);
    let mut child = command.spawn().map_err(|error| ProcessManagerError::Spawn {
        process: project.name.clone(),
        command: project.command_line(),
        error,
    })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let (Some(stdout), Some(stderr)) = (stdout, stderr) else {
        let _ = child.kill();
        let _ = child.wait();
        return Err(ProcessManagerError::MissingStdio {
            process: project.name.clone(),
        });
    };

    let pid = child.id();
    let child = Arc::new(Mutex::new(child));
    let readers = vec![
        spawn_reader(stdout, tracker, OutputStream::Stdout, events.clone()),
        spawn_reader(stderr, tracker, OutputStream::Stderr, events.clone()),
    ];
    spawn_exit_watcher(child.clone(), readers, tracker, events.clone());

    Ok(SpawnedProcess { pid, child })
}

fn build_command(project: &Project) -> ProcessCommand {
    let mut process = if project.direct_exec {
        let mut process = ProcessCommand::new(&project.command);
        process.args(&project.args);
        process
    } else {
        let mut process = ProcessCommand::new("sh");
        process.arg("-c").arg(project.command_line());
        process
    };
    process
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = &project.working_dir {
        process.current_dir(dir);
        with_local_node_bin_path(&mut process, dir);
    }
    #[cfg(unix)]
    unsafe {
        process.pre_exec(|| {
            setpgid(Pid::from_raw(0), Pid::from_raw(0))
                .map_err(|error| std::io::Error::new(ErrorKind::Other, error.to_string()))
        });
    }
    process
}

fn spawn_reader<R>(
    mut reader: R,
    tracker: usize,
    stream: OutputStream,
    events: Sender<ProcessEvent>,
) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = [0u8; READ_CHUNK_BYTES];
        let mut pending: Vec<u8> = Vec::new();
        loop {
            let read = match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => read,
                Err(error) if error.kind() == ErrorKind::Interrupted => continue,
                Err(_) => break,
            };
            pending.extend_from_slice(&buf[..read]);
            let chunk = take_decodable(&mut pending);
            if chunk.is_empty() {
                continue;
            }
            let event = ProcessEvent {
                tracker,
                kind: ProcessEventKind::Output { stream, chunk },
            };
            if events.send(event).is_err() {
                return;
            }
        }
        if !pending.is_empty() {
            let _ = events.send(ProcessEvent {
                tracker,
                kind: ProcessEventKind::Output {
                    stream,
                    chunk: String::from_utf8_lossy(&pending).into_owned(),
                },
            });
        }
    })
}

fn spawn_exit_watcher(
    child: Arc<Mutex<Child>>,
    readers: Vec<JoinHandle<()>>,
    tracker: usize,
    events: Sender<ProcessEvent>,
) {
    thread::spawn(move || {
        let kind = loop {
            let status = child
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .try_wait();
            match status {
                Ok(Some(status)) => break ProcessEventKind::Exit(ExitSummary::from_status(status)),
                Ok(None) => thread::sleep(EXIT_POLL_INTERVAL),
                Err(error) => break ProcessEventKind::Error(ProcessFailure::from_io(&error)),
            }
        };
        // Give the readers a short window to flush so the exit lands after the
        // last output. A grandchild holding the pipe open must not stall it.
        let deadline = Instant::now() + OUTPUT_DRAIN_WINDOW;
        while readers.iter().any(|reader| !reader.is_finished()) && Instant::now() < deadline {
            thread::sleep(OUTPUT_DRAIN_POLL);
        }
        let _ = events.send(ProcessEvent { tracker, kind });
    });
}

/// Decodes as much of `pending` as possible, keeping an incomplete trailing
/// sequence for the next read. Each invalid sequence becomes one U+FFFD.
pub(crate) fn take_decodable(pending: &mut Vec<u8>) -> String {
    let mut text = String::with_capacity(pending.len());
    let mut start = 0usize;
    while start < pending.len() {
        match std::str::from_utf8(&pending[start..]) {
            Ok(valid) => {
                text.push_str(valid);
                start = pending.len();
            }
            Err(error) => {
                let valid_end = start + error.valid_up_to();
                text.push_str(&String::from_utf8_lossy(&pending[start..valid_end]));
                match error.error_len() {
                    Some(len) => {
                        text.push(char::REPLACEMENT_CHARACTER);
                        start = valid_end + len;
                    }
                    None => {
                        start = valid_end;
                        break;
                    }
                }
            }
        }
    }
    pending.drain(..start);
    text
}

fn with_local_node_bin_path(process: &mut ProcessCommand, cwd: &Path) {
    let local_bin = cwd.join("node_modules/.bin");
    if !local_bin.is_dir() {
        return;
    }
    let local_rendered = local_bin.display().to_string();
    let merged = match std::env::var("PATH") {
        Ok(path) if !path.is_empty() => format!("{local_rendered}:{path}"),
        _ => local_rendered,
    };
    process.env("PATH", merged);
}

#[cfg(unix)]
fn signal_process_group(pid: u32, signal: Signal) -> Result<(), ProcessManagerError> {
    let pid = pid as i32;
    if pid <= 0 {
        return Ok(());
    }
    match kill(Pid::from_raw(-pid), signal) {
        Ok(()) | Err(Errno::ESRCH) => Ok(()),
        Err(errno) => Err(ProcessManagerError::Signal {
            pid: pid as u32,
            detail: errno.desc().to_owned(),
        }),
    }
}
