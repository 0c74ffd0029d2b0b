use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::AtomicBool;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::errors::BenchError;
use crate::interrupt::is_interrupted;
use crate::types::RunOutcome;

pub const DEFAULT_GRACE: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs one child at a time under a hard wall-clock ceiling.
#[derive(Debug, Clone)]
pub struct Supervisor {
    /// How long a signalled process group may take to exit before SIGKILL.
    pub grace: Duration,
    pub poll_interval: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Supervisor {
            grace: DEFAULT_GRACE,
            poll_interval: POLL_INTERVAL,
        }
    }
}

impl Supervisor {
    pub fn new(grace: Duration) -> Self {
        Supervisor {
            grace,
            ..Supervisor::default()
        }
    }

    /// Launch `executable` as the leader of a new process group and wait for
    /// it to exit, time out, or be cancelled through `cancel`.
    ///
    /// A non-zero exit is still `Completed`. Only failing to start (or to
    /// poll) the child is an error. No call outlives `timeout` by more than
    /// two grace periods plus a poll tick.
    pub fn supervise<S: AsRef<OsStr>>(
        &self,
        executable: &Path,
        args: &[S],
        timeout: Duration,
        cancel: &AtomicBool,
    ) -> Result<RunOutcome, BenchError> {
        let mut command = Command::new(executable);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let start = Instant::now();
        // A timeout too large to represent is no timeout at all.
        let deadline = start.checked_add(timeout);
        let mut child = command.spawn().map_err(|source| BenchError::LaunchError {
            executable: executable.to_path_buf(),
            source,
        })?;
        debug!(pid = child.id(), executable = %executable.display(), "spawned");

        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    terminate(&mut child, true, self.grace);
                    return Err(BenchError::WaitError { source });
                }
            }

            if is_interrupted(cancel) {
                info!(pid = child.id(), "interrupted, terminating process group");
                terminate(&mut child, true, self.grace);
                return Ok(RunOutcome::Interrupted);
            }

            let mut tick = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    info!(pid = child.id(), timeout_ms = timeout.as_millis() as u64, "timed out, terminating process group");
                    terminate(&mut child, true, self.grace);
                    return Ok(RunOutcome::TimedOut);
                }
                tick = tick.min(deadline - now);
            }

            thread::sleep(tick);
        };
        let elapsed = start.elapsed();

        // The leader is gone but descendants may still hold the pipes open.
        // They get whatever is left of the timeout, and at least one grace period.
        let pipe_wait = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()).max(self.grace),
            None => Duration::MAX,
        };
        let pipes_open_since = Instant::now();
        let stdout = self.collect(&stdout_rx, pipe_wait, child.id());
        let stderr = self.collect(
            &stderr_rx,
            pipe_wait.saturating_sub(pipes_open_since.elapsed()),
            child.id(),
        );

        Ok(RunOutcome::Completed {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
            elapsed,
        })
    }

    fn collect(&self, rx: &Receiver<String>, wait: Duration, pgid: u32) -> String {
        // recv_timeout blocks indefinitely when `wait` cannot be added to now
        if let Ok(text) = rx.recv_timeout(wait) {
            return text;
        }
        warn!(pgid, "output still open after leader exit, killing stragglers");
        kill_group(pgid);
        rx.recv_timeout(self.grace).unwrap_or_default()
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Stop `child`, and with `include_descendants` every process in its group.
///
/// Sends SIGINT first, waits up to `grace` for the leader, then SIGKILLs the
/// whole group regardless so descendants ignoring SIGINT cannot linger.
/// Always reaps the leader.
pub fn terminate(child: &mut Child, include_descendants: bool, grace: Duration) {
    #[cfg(unix)]
    {
        if include_descendants {
            use nix::sys::signal::{Signal, killpg};
            use nix::unistd::Pid;

            let pgid = Pid::from_raw(child.id() as i32);
            if let Err(err) = killpg(pgid, Signal::SIGINT) {
                warn!(pgid = child.id(), error = %err, "failed to interrupt process group");
            }

            let signalled = Instant::now();
            while signalled.elapsed() < grace {
                if let Ok(Some(_)) = child.try_wait() {
                    break;
                }
                thread::sleep(POLL_INTERVAL);
            }

            kill_group(child.id());
            let _ = child.wait();
            return;
        }
    }

    #[cfg(not(unix))]
    let _ = (include_descendants, grace);

    if let Err(err) = child.kill() {
        debug!(pid = child.id(), error = %err, "kill failed, child probably exited");
    }
    let _ = child.wait();
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pgid, error = %err, "failed to kill process group"),
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}
