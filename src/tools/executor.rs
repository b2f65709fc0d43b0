//! Process Runner
//!
//! This module supervises a single external process invocation: it applies
//! privilege elevation when asked to, launches the argument vector without a
//! shell, captures stdout and stderr separately, and enforces a wall-clock
//! timeout.
//!
//! The runner never returns an error. Every invocation ends in an
//! [`ExecutionOutcome`], either `Completed` with the exit code and captured
//! output or `Failed` with a timeout or launch failure.

use super::timeout::ExecutionTimeout;
use crate::metrics;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command as TokioCommand};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{killpg, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Maximum captured bytes per stream (1MB)
const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// How long a timed-out process group gets to exit after SIGTERM
const TERM_GRACE: Duration = Duration::from_secs(2);

/// How long to wait for a killed process to be reaped
const KILL_GRACE: Duration = Duration::from_secs(5);

/// An argument vector: the program followed by its arguments
///
/// A spec is built fresh for each invocation from already-sanitized tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    argv: Vec<String>,
}

impl CommandSpec {
    /// Create a command from a program and its arguments
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args.into_iter().map(Into::into));
        Self { argv }
    }

    /// The executable name or path
    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the program
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    /// The full argument vector
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// Append one argument
    pub fn push(&mut self, arg: impl Into<String>) {
        self.argv.push(arg.into());
    }

    /// Space-joined rendering for responses and logs
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

/// Capability to run a command with escalated privileges
///
/// Holding an `Elevation` is what allows the runner to prefix a command with
/// the elevation program. When the gateway is configured without one, every
/// elevated invocation fails at launch instead of silently running
/// unprivileged.
///
/// Spawned processes are not sandboxed. Elevated tools get broad host
/// capability; isolating the host is a deployment concern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elevation {
    prefix: Vec<String>,
}

impl Elevation {
    /// Elevation through `sudo`
    pub fn sudo() -> Self {
        Self {
            prefix: vec!["sudo".to_string()],
        }
    }

    /// Elevation through an arbitrary argv prefix; `None` if the prefix is empty
    pub fn from_prefix(prefix: Vec<String>) -> Option<Self> {
        if prefix.iter().all(|part| part.trim().is_empty()) {
            None
        } else {
            Some(Self { prefix })
        }
    }

    /// Prefix `spec` with the elevation invocation
    pub fn wrap(&self, spec: &CommandSpec) -> CommandSpec {
        let mut argv = self.prefix.clone();
        argv.extend(spec.argv().iter().cloned());
        CommandSpec { argv }
    }
}

/// One request to the runner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Command to launch
    pub spec: CommandSpec,

    /// Wall-clock limit
    pub timeout: ExecutionTimeout,

    /// Whether to run through the elevation capability
    pub elevate: bool,
}

impl Invocation {
    pub fn new(spec: CommandSpec, timeout: ExecutionTimeout) -> Self {
        Self {
            spec,
            timeout,
            elevate: false,
        }
    }

    /// Request elevation for this invocation
    pub fn elevated(mut self, elevate: bool) -> Self {
        self.elevate = elevate;
        self
    }
}

/// Output captured before a timeout fired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Why an invocation did not complete
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionFailure {
    /// The process exceeded its timeout and was killed
    #[error("Command timed out after {}s", .after.as_secs())]
    Timeout {
        after: Duration,
        partial: Option<PartialOutput>,
    },

    /// The process could not be started
    #[error("{message}")]
    Launch { message: String },
}

/// Result of a single runner invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The process ran to exit
    Completed {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// The process timed out or never started
    Failed(ExecutionFailure),
}

impl ExecutionOutcome {
    /// Exit code, or `-1` when the process did not complete
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed { exit_code, .. } => *exit_code,
            Self::Failed(_) => -1,
        }
    }

    /// Captured stdout; empty for failures unless partial output was kept
    pub fn stdout(&self) -> &str {
        match self {
            Self::Completed { stdout, .. } => stdout,
            Self::Failed(ExecutionFailure::Timeout {
                partial: Some(partial),
                ..
            }) => &partial.stdout,
            Self::Failed(_) => "",
        }
    }

    /// Captured stderr; for failures, the failure reason followed by any kept stderr
    pub fn stderr(&self) -> String {
        match self {
            Self::Completed { stderr, .. } => stderr.clone(),
            Self::Failed(failure @ ExecutionFailure::Timeout { partial, .. }) => match partial {
                Some(partial) if !partial.stderr.is_empty() => {
                    format!("{}\n{}", failure, partial.stderr)
                }
                _ => failure.to_string(),
            },
            Self::Failed(failure) => failure.to_string(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Failed(ExecutionFailure::Timeout { .. }))
    }
}

/// Seam between the gateway and process supervision
///
/// The gateway only talks to this trait, which lets tests substitute a
/// recording double that never launches anything.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    /// Run one invocation to completion, timeout or launch failure
    async fn run(&self, invocation: Invocation) -> ExecutionOutcome;
}

/// Configuration for tool execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum captured bytes per stream (default: 1MB, 0 = unlimited)
    pub max_output_size: usize,

    /// Keep output captured before a timeout (default: false)
    pub preserve_partial_output: bool,

    /// Cap on simultaneously running processes (default: 0 = unlimited)
    pub max_concurrent: usize,

    /// Elevation capability (default: sudo)
    pub elevation: Option<Elevation>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_output_size: MAX_OUTPUT_SIZE,
            preserve_partial_output: false,
            max_concurrent: 0,
            elevation: Some(Elevation::sudo()),
        }
    }
}

impl ExecutorConfig {
    /// Create a new executor config with custom output limit
    pub fn with_max_output_size(size: usize) -> Self {
        Self {
            max_output_size: size,
            ..Default::default()
        }
    }

    /// Keep partial output on timeout
    pub fn preserving_partial_output(mut self) -> Self {
        self.preserve_partial_output = true;
        self
    }

    /// Limit concurrently running processes
    pub fn with_max_concurrent(mut self, limit: usize) -> Self {
        self.max_concurrent = limit;
        self
    }

    /// Replace the elevation capability
    pub fn with_elevation(mut self, elevation: Option<Elevation>) -> Self {
        self.elevation = elevation;
        self
    }
}

/// Tool executor for secure subprocess execution
///
/// # Security
///
/// This executor implements secure subprocess execution by:
/// 1. Using `tokio::process::Command` without a shell
/// 2. Attaching no stdin to the child
/// 3. Enforcing timeout limits and killing the child on expiry
/// 4. Limiting captured output to prevent memory exhaustion
///
/// # Example
///
/// ```no_run
/// use cipherbot_gateway::tools::{CommandSpec, ExecutionTimeout, Invocation, ProcessRunner, ToolExecutor};
///
/// #[tokio::main]
/// async fn main() {
///     let executor = ToolExecutor::new();
///     let spec = CommandSpec::new("echo", ["hello world"]);
///     let outcome = executor.run(Invocation::new(spec, ExecutionTimeout::listing())).await;
///     assert_eq!(outcome.exit_code(), 0);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    config: ExecutorConfig,
    slots: Option<Arc<Semaphore>>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor {
    /// Create a new tool executor with default configuration
    pub fn new() -> Self {
        Self::with_config(ExecutorConfig::default())
    }

    /// Create a new tool executor with custom configuration
    pub fn with_config(config: ExecutorConfig) -> Self {
        let slots = (config.max_concurrent > 0)
            .then(|| Arc::new(Semaphore::new(config.max_concurrent)));
        Self { config, slots }
    }

    /// Get a reference to the config
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Build the final argument vector for an invocation
    ///
    /// Fails when elevation is requested but no elevation capability is
    /// configured.
    pub fn resolve(&self, invocation: &Invocation) -> Result<CommandSpec, ExecutionFailure> {
        if !invocation.elevate {
            return Ok(invocation.spec.clone());
        }
        match &self.config.elevation {
            Some(elevation) => Ok(elevation.wrap(&invocation.spec)),
            None => Err(ExecutionFailure::Launch {
                message: format!(
                    "Privilege elevation is disabled; refusing to run {}",
                    invocation.spec.program()
                ),
            }),
        }
    }

    async fn supervise(&self, invocation: Invocation, id: Uuid) -> ExecutionOutcome {
        let command = match self.resolve(&invocation) {
            Ok(command) => command,
            Err(failure) => return ExecutionOutcome::Failed(failure),
        };

        let _permit = match &self.slots {
            Some(slots) => match Arc::clone(slots).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(e) => {
                    return ExecutionOutcome::Failed(ExecutionFailure::Launch {
                        message: format!("Process slots unavailable: {}", e),
                    })
                }
            },
            None => None,
        };

        info!(
            invocation = %id,
            program = %command.program(),
            args = command.args().len(),
            elevate = invocation.elevate,
            timeout_secs = invocation.timeout.as_secs(),
            "Launching process"
        );
        debug!(invocation = %id, argv = ?command.argv(), "Process argument vector");

        let mut process = TokioCommand::new(command.program());
        process
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so a timeout can reach everything the tool starts.
        #[cfg(unix)]
        process.process_group(0);

        let mut child = match process.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(invocation = %id, program = %command.program(), error = %e, "Process failed to launch");
                return ExecutionOutcome::Failed(ExecutionFailure::Launch {
                    message: format!("Failed to launch {}: {}", command.program(), e),
                });
            }
        };

        let group = child.id();

        let limit = self.config.max_output_size;
        let stdout_buf = Arc::new(Mutex::new(Capture::default()));
        let stderr_buf = Arc::new(Mutex::new(Capture::default()));
        let mut stdout_task = spawn_capture(child.stdout.take(), Arc::clone(&stdout_buf), limit);
        let mut stderr_task = spawn_capture(child.stderr.take(), Arc::clone(&stderr_buf), limit);

        let waited = tokio::time::timeout(invocation.timeout.duration(), async {
            let status = child.wait().await;
            let _ = (&mut stdout_task).await;
            let _ = (&mut stderr_task).await;
            status
        })
        .await;

        match waited {
            Ok(Ok(status)) => ExecutionOutcome::Completed {
                exit_code: exit_code_of(status),
                stdout: snapshot(&stdout_buf, limit),
                stderr: snapshot(&stderr_buf, limit),
            },
            Ok(Err(e)) => ExecutionOutcome::Failed(ExecutionFailure::Launch {
                message: format!("Failed waiting for {}: {}", command.program(), e),
            }),
            Err(_) => {
                terminate(&mut child, group).await;
                stdout_task.abort();
                stderr_task.abort();

                let partial = self.config.preserve_partial_output.then(|| PartialOutput {
                    stdout: snapshot(&stdout_buf, limit),
                    stderr: snapshot(&stderr_buf, limit),
                });
                ExecutionOutcome::Failed(ExecutionFailure::Timeout {
                    after: invocation.timeout.duration(),
                    partial,
                })
            }
        }
    }
}

#[async_trait]
impl ProcessRunner for ToolExecutor {
    async fn run(&self, invocation: Invocation) -> ExecutionOutcome {
        let id = Uuid::new_v4();
        let program = invocation.spec.program().to_string();
        let start = Instant::now();

        metrics::ACTIVE_PROCESSES.inc();
        let outcome = self.supervise(invocation, id).await;
        metrics::ACTIVE_PROCESSES.dec();

        let elapsed = start.elapsed();
        metrics::PROCESS_DURATION_SECONDS
            .with_label_values(&[program.as_str()])
            .observe(elapsed.as_secs_f64());

        let label = match &outcome {
            ExecutionOutcome::Completed { exit_code, .. } => {
                if *exit_code == 0 {
                    info!(invocation = %id, %program, elapsed_ms = elapsed.as_millis() as u64, "Process completed");
                } else {
                    warn!(invocation = %id, %program, exit_code, "Process exited with non-zero status");
                }
                "completed"
            }
            ExecutionOutcome::Failed(ExecutionFailure::Timeout { after, .. }) => {
                warn!(invocation = %id, %program, timeout_secs = after.as_secs(), "Process timed out and was killed");
                "timeout"
            }
            ExecutionOutcome::Failed(ExecutionFailure::Launch { message }) => {
                warn!(invocation = %id, %program, %message, "Process launch failed");
                "launch_error"
            }
        };
        metrics::PROCESS_LAUNCHES_TOTAL
            .with_label_values(&[label])
            .inc();

        outcome
    }
}

/// Stop a timed-out process and everything in its group
///
/// The group gets SIGTERM first so an elevation wrapper such as `sudo` can
/// relay it to the privileged child, which a non-root gateway cannot signal
/// directly. Whatever is left after the grace period gets SIGKILL.
#[cfg(unix)]
async fn terminate(child: &mut Child, group: Option<u32>) {
    signal_group(group, Signal::SIGTERM);
    if tokio::time::timeout(TERM_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
    }
    signal_group(group, Signal::SIGKILL);
}

#[cfg(not(unix))]
async fn terminate(child: &mut Child, _group: Option<u32>) {
    let _ = child.start_kill();
    let _ = tokio::time::timeout(KILL_GRACE, child.wait()).await;
}

#[cfg(unix)]
fn signal_group(group: Option<u32>, signal: Signal) {
    let Some(pgid) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), signal) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => debug!(pgid, signal = ?signal, error = %e, "Failed to signal process group"),
    }
}

/// Bytes read from one stream, capped at the output limit
#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    total: usize,
}

/// Drain a child pipe into a shared buffer
///
/// The pipe is read to EOF even after the cap is reached so the child never
/// blocks on a full pipe.
fn spawn_capture<R>(pipe: Option<R>, buffer: Arc<Mutex<Capture>>, limit: usize) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut pipe) = pipe else {
            return;
        };
        let mut chunk = [0u8; 8192];
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut capture = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    capture.total += n;
                    let room = if limit == 0 {
                        n
                    } else {
                        limit.saturating_sub(capture.bytes.len()).min(n)
                    };
                    capture.bytes.extend_from_slice(&chunk[..room]);
                }
            }
        }
    })
}

/// Decode what was captured so far, marking truncation
fn snapshot(buffer: &Mutex<Capture>, limit: usize) -> String {
    let capture = buffer.lock().unwrap_or_else(|e| e.into_inner());
    let text = String::from_utf8_lossy(&capture.bytes).into_owned();
    if limit > 0 && capture.total > limit {
        format!(
            "{}\n[output truncated: {} of {} bytes shown]",
            text,
            capture.bytes.len(),
            capture.total
        )
    } else {
        text
    }
}

/// Exit code of a finished process; signal deaths map to the negated signal number
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    -1
}
