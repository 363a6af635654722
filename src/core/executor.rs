//! Command execution module.
//!
//! Runs external programs (git, mostly) synchronously with captured output
//! and an optional timeout. The engine only talks to [`CommandRunner`], so
//! tests can substitute a scripted runner.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Poll interval while waiting on a child with a deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of executing a command.
#[derive(Debug)]
pub struct ExecutionResult {
    /// Exit status of the command
    pub status: ExitStatus,

    /// Standard output
    pub stdout: String,

    /// Standard error
    pub stderr: String,

    /// Time taken to execute
    pub duration: Duration,
}

impl ExecutionResult {
    /// Check if the command succeeded (exit code 0).
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code.
    pub fn code(&self) -> Option<i32> {
        self.status.code()
    }
}

/// Errors surfaced by a command runner.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("Failed to run '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The program did not finish before the deadline and was killed.
    #[error("'{command}' timed out after {seconds} seconds")]
    Timeout { command: String, seconds: u64 },

    /// The program exited unsuccessfully.
    #[error("'{command}' exited with code {code:?}: {stderr}")]
    Failed { command: String, code: Option<i32>, stdout: String, stderr: String },
}

impl CommandError {
    /// Combined stdout/stderr text, used to classify failures.
    pub fn output_text(&self) -> String {
        match self {
            Self::Failed { stdout, stderr, .. } => format!("{stdout}\n{stderr}"),
            other => other.to_string(),
        }
    }
}

/// Anything that can run a program and hand back its output.
///
/// Implementations must treat a non-zero exit as [`CommandError::Failed`].
pub trait CommandRunner {
    /// Run `program` with `args` inside `cwd`.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String, CommandError>;
}

/// Command executor backed by `std::process`.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    /// Timeout for command execution
    pub timeout: Option<Duration>,

    /// Working directory override
    pub working_dir: Option<PathBuf>,
}

impl Executor {
    /// Create a new executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set execution timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the working directory used when callers don't pass one.
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Execute a program, capturing stdout and stderr.
    pub fn execute(
        &self,
        program: &str,
        args: &[&str],
        cwd: Option<&Path>,
    ) -> Result<ExecutionResult, CommandError> {
        let command = display_command(program, args);
        let start = Instant::now();

        let mut cmd = ProcessCommand::new(program);
        cmd.args(args);
        if let Some(dir) = cwd.or(self.working_dir.as_deref()) {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child =
            cmd.spawn().map_err(|source| CommandError::Spawn { command: command.clone(), source })?;

        // Drain both pipes on threads so a chatty child can't block on a full pipe.
        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stdout_pipe {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });
        let stderr_handle = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(ref mut pipe) = stderr_pipe {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let status = match self.timeout {
            Some(limit) => loop {
                match child.try_wait() {
                    Ok(Some(status)) => break status,
                    Ok(None) if start.elapsed() >= limit => {
                        let _ = child.kill();
                        let _ = child.wait();
                        tracing::warn!(command = %command, "Command timed out");
                        return Err(CommandError::Timeout {
                            command,
                            seconds: limit.as_secs(),
                        });
                    }
                    Ok(None) => std::thread::sleep(POLL_INTERVAL),
                    Err(source) => return Err(CommandError::Spawn { command, source }),
                }
            },
            None => child
                .wait()
                .map_err(|source| CommandError::Spawn { command: command.clone(), source })?,
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        Ok(ExecutionResult { status, stdout, stderr, duration: start.elapsed() })
    }
}

impl CommandRunner for Executor {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<String, CommandError> {
        let command = display_command(program, args);
        tracing::debug!(command = %command, cwd = ?cwd, "Executing command");

        let result = self.execute(program, args, Some(cwd))?;
        if result.success() {
            Ok(result.stdout)
        } else {
            Err(CommandError::Failed {
                command,
                code: result.code(),
                stdout: result.stdout,
                stderr: result.stderr,
            })
        }
    }
}

fn display_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}
