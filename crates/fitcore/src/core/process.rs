//! Process execution utilities with timeout support
//!
//! Provides a blocking helper for running external processes (ffmpeg, ffprobe, yt-dlp)
//! with a bounded timeout so a hung process cannot pin a worker forever.
//! Callers run it from the worker pool, never from the async scheduler.
//!
//! On unix the child leads its own process group. Killing it takes down the
//! whole tree, e.g. the ffmpeg that yt-dlp spawns for `--recode-video`.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

/// Interval between `try_wait` polls
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long to wait for pipe readers once the process has exited
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Failure to run a process to completion. A non-zero exit is NOT an error here.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to spawn {program}: {source}")]
    Spawn { program: String, source: std::io::Error },

    #[error("{program} timed out after {}s", .timeout.as_secs())]
    Timeout { program: String, timeout: Duration },

    #[error("Failed to wait for {program}: {source}")]
    Wait { program: String, source: std::io::Error },
}

/// Captured result of a finished process
#[derive(Debug)]
pub struct ProcessOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// First 500 bytes of stderr, for log lines
    pub fn stderr_excerpt(&self) -> &str {
        excerpt(&self.stderr, 500)
    }
}

/// Truncate `text` to at most `max` bytes on a char boundary
pub fn excerpt(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> Option<Receiver<String>> {
    stream.map(|mut s| {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = s.read_to_end(&mut buf);
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// Wait for a reader until `deadline`. A reader still blocked after that is detached.
fn collect(reader: Option<Receiver<String>>, deadline: Instant) -> String {
    reader
        .and_then(|rx| rx.recv_timeout(deadline.saturating_duration_since(Instant::now())).ok())
        .unwrap_or_default()
}

#[cfg(unix)]
fn isolate(cmd: &mut Command) {
    use std::os::unix::process::CommandExt;
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn isolate(_cmd: &mut Command) {}

/// SIGKILL every process left in the child's group
#[cfg(unix)]
fn kill_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Ok(pgid) = i32::try_from(child.id()) {
        // ESRCH just means the group is already empty
        let _ = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_group(_child: &Child) {}

fn kill_and_reap(child: &mut Child) {
    kill_group(child);
    let _ = child.kill();
    let _ = child.wait();
}

/// Run a Command to completion with a timeout. Kills the child on timeout.
///
/// stdout and stderr are drained on helper threads while the process runs,
/// so chatty tools (yt-dlp `-J` on large pages) cannot block on a full pipe.
pub fn run_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<ProcessOutput, ProcessError> {
    let program = cmd.get_program().to_string_lossy().into_owned();
    log::debug!("Executing command: {:?}", cmd);

    isolate(cmd);
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    log::error!("{} process timed out after {}s, killing", program, timeout.as_secs());
                    kill_and_reap(&mut child);
                    // Readers are detached; their threads end once the pipes close
                    drop(stdout);
                    drop(stderr);
                    return Err(ProcessError::Timeout { program, timeout });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                kill_and_reap(&mut child);
                return Err(ProcessError::Wait { program, source });
            }
        }
    };

    // Background leftovers would otherwise hold the pipes open
    kill_group(&child);
    let drain_deadline = deadline.max(Instant::now() + DRAIN_GRACE);
    let output = ProcessOutput {
        status,
        stdout: collect(stdout, drain_deadline),
        stderr: collect(stderr, drain_deadline),
    };
    log::debug!(
        "{} exited with {} (stdout {} bytes, stderr {} bytes)",
        program,
        output.status,
        output.stdout.len(),
        output.stderr.len()
    );
    Ok(output)
}

/// Check that a tool starts and exits cleanly, e.g. `ffmpeg -version`
pub fn tool_available(program: &str, version_arg: &str) -> bool {
    let mut cmd = Command::new(program);
    cmd.arg(version_arg);
    match run_with_timeout(&mut cmd, Duration::from_secs(10)) {
        Ok(output) if output.success() => {
            let version = output.stdout.lines().next().unwrap_or_default();
            log::info!("{} available: {}", program, version.trim());
            true
        }
        Ok(output) => {
            log::error!("{} {} exited with {}: {}", program, version_arg, output.status, output.stderr_excerpt());
            false
        }
        Err(e) => {
            log::error!("{} is not available: {}", program, e);
            false
        }
    }
}
