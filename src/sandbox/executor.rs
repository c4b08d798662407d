//! Time-bounded interpreter runs.
//!
//! # Notes on stdout/stderr capture and timeouts
//!
//! Output is drained on dedicated threads while the child runs: reading only
//! after exit would let a chatty script fill the pipe and block forever.
//!
//! The child is placed in its own process group. On timeout the whole group
//! gets SIGKILL, so anything the interpreter started dies with it and the
//! drain threads see EOF.

use std::io::{self, Read, Write};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempPath;
use tracing::{debug, instrument, trace, warn};

use super::ExecutorConfig;
use crate::error::ExecutionFailure;
use crate::validator;

/// File name prefix of the temporary script.
pub const SCRIPT_PREFIX: &str = "diagram-guard-";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Outcome of one sandboxed run.
#[derive(Debug)]
#[must_use]
pub enum ExecutionResult {
    /// Interpreter exited zero.
    Success { stdout: String },
    Failure(ExecutionFailure),
}

impl ExecutionResult {
    /// Returns `true` if the script ran and exited zero.
    pub fn success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Captured standard output of a successful run.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            Self::Success { stdout } => Some(stdout),
            Self::Failure(_) => None,
        }
    }

    /// Human-readable diagnostic of a failed run.
    pub fn diagnostic(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure(failure) => Some(failure.to_string()),
        }
    }

    /// Converts into a `Result`, for `?` at call sites.
    ///
    /// # Errors
    ///
    /// Returns the [`ExecutionFailure`] of a failed run.
    pub fn into_result(self) -> Result<String, ExecutionFailure> {
        match self {
            Self::Success { stdout } => Ok(stdout),
            Self::Failure(failure) => Err(failure),
        }
    }
}

/// Starts the interpreter process.
///
/// [`SystemSpawner`] is the only production implementation; the seam lets
/// tests observe whether, and with what arguments, a process was started.
pub trait Spawner {
    /// Spawns `command` as configured.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the process cannot be started.
    fn spawn(&self, command: &mut Command) -> io::Result<Child>;
}

/// Spawns through [`Command::spawn`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpawner;

impl Spawner for SystemSpawner {
    fn spawn(&self, command: &mut Command) -> io::Result<Child> {
        command.spawn()
    }
}

/// Validates and runs scripts in a scrubbed, time-bounded child process.
///
/// # Example
///
/// ```no_run
/// use diagram_guard::sandbox::{Executor, ExecutorConfig};
///
/// let executor = Executor::new(ExecutorConfig::default());
/// let result = executor.execute("print('hello')\n");
/// assert_eq!(result.stdout(), Some("hello\n"));
/// ```
#[derive(Debug)]
pub struct Executor<S = SystemSpawner> {
    config: ExecutorConfig,
    spawner: S,
}

impl Executor<SystemSpawner> {
    /// Creates an executor that spawns real processes.
    #[must_use]
    pub fn new(config: ExecutorConfig) -> Self {
        Self::with_spawner(config, SystemSpawner)
    }
}

impl Default for Executor<SystemSpawner> {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl<S: Spawner> Executor<S> {
    /// Creates an executor that starts processes through `spawner`.
    #[must_use]
    pub fn with_spawner(config: ExecutorConfig, spawner: S) -> Self {
        Self { config, spawner }
    }

    /// Returns a reference to the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    #[must_use]
    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    /// Runs `code` with the configured budget.
    pub fn execute(&self, code: &str) -> ExecutionResult {
        self.execute_with_timeout(code, self.config.timeout)
    }

    /// Validates `code`, writes it to a temporary script and runs it.
    ///
    /// Validation happens here regardless of what the caller already checked.
    /// A script with violations is never written to disk and no process is
    /// started. The temporary script is removed on every other path. The file
    /// holds the newline-normalized text that was validated.
    #[instrument(skip(self, code), fields(bytes = code.len(), budget_ms = %budget.as_millis()))]
    pub fn execute_with_timeout(&self, code: &str, budget: Duration) -> ExecutionResult {
        debug!(stage = "validating");
        let code = validator::normalize_newlines(code);
        let validation = validator::validate(&code);
        if !validation.is_valid() {
            debug!(
                stage = "rejected",
                violations = validation.violations().len()
            );
            return ExecutionResult::Failure(ExecutionFailure::Rejected(
                validation.into_violations(),
            ));
        }

        let script = match write_script(&code) {
            Ok(script) => script,
            Err(failure) => return ExecutionResult::Failure(failure),
        };
        debug!(stage = "prepared", script = %script.display());

        let result = self.run(&script, budget);

        if let Err(e) = script.close() {
            warn!(error = %e, "Failed to remove temporary script");
        }
        debug!(stage = "cleaned");

        result
    }

    fn run(&self, script: &Path, budget: Duration) -> ExecutionResult {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(script)
            .env_clear()
            .envs(self.config.child_env(|name| std::env::var_os(name)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = &self.config.working_dir {
            cmd.current_dir(dir);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        debug!(stage = "running", interpreter = %self.config.interpreter.display());
        let mut child = match self.spawner.spawn(&mut cmd) {
            Ok(child) => child,
            Err(e) => {
                debug!(stage = "failed", error = %e);
                return ExecutionResult::Failure(ExecutionFailure::io(
                    format!(
                        "failed to start interpreter {}",
                        self.config.interpreter.display()
                    ),
                    e,
                ));
            }
        };

        let (stdout_rx, stdout_join) = drain(child.stdout.take());
        let (stderr_rx, stderr_join) = drain(child.stderr.take());

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > budget {
                        debug!(stage = "timed_out", elapsed_ms = %start.elapsed().as_millis());
                        kill_process_group(&mut child);
                        let _ = child.wait();
                        let _ = stdout_join.join();
                        let _ = stderr_join.join();
                        return ExecutionResult::Failure(ExecutionFailure::TimedOut { budget });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    kill_process_group(&mut child);
                    let _ = child.wait();
                    let _ = stdout_join.join();
                    let _ = stderr_join.join();
                    debug!(stage = "failed", error = %e);
                    return ExecutionResult::Failure(ExecutionFailure::io(
                        "failed to wait for interpreter",
                        e,
                    ));
                }
            }
        };

        let stdout_bytes = stdout_rx.recv().unwrap_or_default();
        let stderr_bytes = stderr_rx.recv().unwrap_or_default();
        let _ = stdout_join.join();
        let _ = stderr_join.join();

        trace!(
            stdout_bytes = stdout_bytes.len(),
            stderr_bytes = stderr_bytes.len(),
            "Output captured"
        );

        if status.success() {
            let Ok(stdout) = String::from_utf8(stdout_bytes) else {
                return ExecutionResult::Failure(ExecutionFailure::OutputEncoding {
                    stream: "stdout",
                });
            };
            debug!(stage = "succeeded", elapsed_ms = %start.elapsed().as_millis());
            ExecutionResult::Success { stdout }
        } else {
            let Ok(stderr) = String::from_utf8(stderr_bytes) else {
                return ExecutionResult::Failure(ExecutionFailure::OutputEncoding {
                    stream: "stderr",
                });
            };
            debug!(stage = "failed", exit_code = ?status.code());
            ExecutionResult::Failure(ExecutionFailure::NonZeroExit {
                code: status.code(),
                stderr,
            })
        }
    }
}

/// Runs `code` with the default configuration and the given budget.
pub fn execute(code: &str, budget: Duration) -> ExecutionResult {
    Executor::default().execute_with_timeout(code, budget)
}

fn write_script(code: &str) -> Result<TempPath, ExecutionFailure> {
    let mut file = tempfile::Builder::new()
        .prefix(SCRIPT_PREFIX)
        .suffix(".py")
        .tempfile()
        .map_err(|e| ExecutionFailure::io("failed to create temporary script", e))?;

    file.write_all(code.as_bytes())
        .and_then(|()| file.flush())
        .map_err(|e| ExecutionFailure::io("failed to write temporary script", e))?;

    Ok(file.into_temp_path())
}

fn drain<R>(reader: Option<R>) -> (mpsc::Receiver<Vec<u8>>, thread::JoinHandle<()>)
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let join = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            let _ = r.read_to_end(&mut buf);
        }
        let _ = tx.send(buf);
    });
    (rx, join)
}

#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // The child leads its own group, so its pid is the group id.
    if let Err(errno) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        warn!(%errno, "killpg failed, killing interpreter only");
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    let _ = child.kill();
}
