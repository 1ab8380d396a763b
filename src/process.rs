//! External command execution.
//!
//! Commands are run through the platform shell with stderr merged into
//! stdout, so the captured text keeps the order the tool printed it in.

use std::fmt;
use std::io;
use std::process::Output;
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Default interval between liveness polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One shell command line, e.g. `sfc /scannow`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandLine(String);

impl CommandLine {
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn expression(&self) -> duct::Expression {
        if cfg!(windows) {
            duct::cmd("cmd", ["/C", self.0.as_str()])
        } else {
            duct::cmd("sh", ["-c", self.0.as_str()])
        }
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Exit status and merged stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `-1` when the process was ended by a signal.
    pub exit_code: i32,
    pub output: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Non-empty output lines, trimmed.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
    }
}

impl From<&Output> for ProcessOutput {
    fn from(output: &Output) -> Self {
        // Some Windows tools (sfc) print UTF-16; dropping the NULs keeps it readable.
        let text = String::from_utf8_lossy(&output.stdout).replace('\0', "");
        Self {
            exit_code: output.status.code().unwrap_or(-1),
            output: text,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: io::Error,
    },
    #[error("failed while waiting for `{command}`: {source}")]
    Wait {
        command: String,
        #[source]
        source: io::Error,
    },
}

/// Synthetic progress tick emitted by [`ProcessRunner::run_with_progress`].
///
/// `step` counts poll intervals the process was seen alive for. It is a
/// pacing signal for the progress bar, not a measure of work done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressTick {
    pub step: u32,
    pub total: u32,
}

pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion, killing it once `timeout` has elapsed.
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ProcessOutput, RunError>;

    /// Run `command` and report one [`ProgressTick`] per poll interval while it
    /// is alive, up to `estimated_steps`. No tick is reported after the process
    /// has exited, and the returned exit code is the real one.
    fn run_with_progress(
        &self,
        command: &CommandLine,
        estimated_steps: u32,
        timeout: Option<Duration>,
        on_tick: &mut dyn FnMut(ProgressTick),
    ) -> Result<ProcessOutput, RunError>;
}

/// Runner backed by the platform shell (`cmd /C` or `sh -c`).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    poll_interval: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ShellRunner {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    fn start(&self, command: &CommandLine) -> Result<duct::Handle, RunError> {
        tracing::debug!(command = %command, "starting external command");
        command
            .expression()
            .stdin_null()
            .stderr_to_stdout()
            .stdout_capture()
            .unchecked()
            .start()
            .map_err(|source| RunError::Launch {
                command: command.to_string(),
                source,
            })
    }

    fn poll(handle: &duct::Handle, command: &CommandLine) -> Result<Option<ProcessOutput>, RunError> {
        match handle.try_wait() {
            Ok(Some(output)) => Ok(Some(ProcessOutput::from(output))),
            Ok(None) => Ok(None),
            Err(source) => Err(RunError::Wait {
                command: command.to_string(),
                source,
            }),
        }
    }

    fn kill(handle: &duct::Handle, command: &CommandLine, after: Duration) -> RunError {
        tracing::warn!(command = %command, seconds = after.as_secs(), "killing timed out command");
        if let Err(e) = handle.kill() {
            tracing::error!(command = %command, error = %e, "failed to kill command");
        }
        RunError::TimedOut(after)
    }
}

impl ProcessRunner for ShellRunner {
    fn run(&self, command: &CommandLine, timeout: Duration) -> Result<ProcessOutput, RunError> {
        let handle = self.start(command)?;
        // A timeout too large to represent never fires.
        let deadline = Instant::now().checked_add(timeout);

        loop {
            if let Some(output) = Self::poll(&handle, command)? {
                return Ok(output);
            }
            let now = Instant::now();
            let pause = match deadline {
                Some(deadline) if now >= deadline => {
                    return Err(Self::kill(&handle, command, timeout));
                }
                Some(deadline) => self.poll_interval.min(deadline - now),
                None => self.poll_interval,
            };
            thread::sleep(pause);
        }
    }

    fn run_with_progress(
        &self,
        command: &CommandLine,
        estimated_steps: u32,
        timeout: Option<Duration>,
        on_tick: &mut dyn FnMut(ProgressTick),
    ) -> Result<ProcessOutput, RunError> {
        let handle = self.start(command)?;
        let started = Instant::now();
        let mut step = 0;

        loop {
            thread::sleep(self.poll_interval);

            if let Some(output) = Self::poll(&handle, command)? {
                return Ok(output);
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    return Err(Self::kill(&handle, command, limit));
                }
            }
            // Still alive after another interval.
            if step < estimated_steps {
                step += 1;
                on_tick(ProgressTick {
                    step,
                    total: estimated_steps,
                });
            }
        }
    }
}
