//! RDP remediation gateway
//!
//! Runs the configured restart command against one target computer:
//! - target validation before anything is spawned
//! - fixed program/arguments, the target is a single argv element
//! - hard wall-clock timeout, the child is killed and reaped on expiry
//! - outcome classified into [`RemediationResult`]
//!
//! Concurrent restarts for the same target are not serialized.

use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command as AsyncCommand;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::CommandTemplate;

/// Per-stream cap on captured output (1 MiB).
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How long output readers may run once the child has exited.
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Raw outcome of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub execution_time_ms: u128,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed while waiting for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {}s", .0.as_secs())]
    TimedOut(Duration),
}

/// Anything able to run the restart action for one target.
#[async_trait]
pub trait RemediationExecutor: Send + Sync {
    async fn execute(&self, target: &str) -> Result<ProcessOutput, ExecutionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Process ran and exited non-zero (`None` when killed by a signal).
    Exit(Option<i32>),
    /// Process could not be started at all.
    Launch,
    /// Process started but could not be waited on.
    Wait,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemediationResult {
    Succeeded { output: String },
    Failed { cause: FailureCause, diagnostics: String },
    TimedOut { after: Duration },
    InvalidRequest { reason: String },
}

/// Executes the configured command as a child process.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    template: CommandTemplate,
    timeout: Duration,
}

impl ProcessExecutor {
    pub fn new(template: CommandTemplate, timeout: Duration) -> Self {
        Self { template, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl RemediationExecutor for ProcessExecutor {
    async fn execute(&self, target: &str) -> Result<ProcessOutput, ExecutionError> {
        let start_time = Instant::now();
        let program = self.template.program.clone();

        // kill_on_drop covers the paths where this future is dropped mid-wait
        // (client disconnect); the timeout path kills and reaps explicitly.
        let mut child = AsyncCommand::new(&program)
            .args(self.template.render(target))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecutionError::Launch { program: program.clone(), source })?;

        let pid = child.id();
        let (stdout_buf, stdout_task) = spawn_reader(child.stdout.take());
        let (stderr_buf, stderr_task) = spawn_reader(child.stderr.take());

        match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                // background processes may keep the pipes open after the child exits
                let grace = tokio::time::Instant::now() + OUTPUT_GRACE;
                let stdout = collect_stream(&stdout_buf, stdout_task, grace).await;
                let stderr = collect_stream(&stderr_buf, stderr_task, grace).await;
                Ok(ProcessOutput {
                    success: status.success(),
                    exit_code: status.code(),
                    stdout,
                    stderr,
                    execution_time_ms: start_time.elapsed().as_millis(),
                })
            }
            Ok(Err(source)) => Err(ExecutionError::Wait { program, source }),
            Err(_elapsed) => {
                warn!(?pid, program = %program, "remediation timed out, killing process");
                if let Err(e) = child.kill().await {
                    error!(?pid, error = %e, "failed to kill timed out remediation process");
                }
                stdout_task.abort();
                stderr_task.abort();
                Err(ExecutionError::TimedOut(self.timeout))
            }
        }
    }
}

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Drains one pipe until EOF, keeping the first [`MAX_OUTPUT_BYTES`].
///
/// Reading continues past the cap so the child never sees a closed pipe.
fn spawn_reader<R>(handle: Option<R>) -> (OutputBuffer, JoinHandle<()>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let buf = OutputBuffer::default();
    let sink = buf.clone();
    let task = tokio::spawn(async move {
        let Some(mut h) = handle else { return };
        let mut chunk = [0u8; 8192];
        loop {
            match h.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let mut out = sink.lock();
                    let room = MAX_OUTPUT_BYTES.saturating_sub(out.len());
                    out.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
    });
    (buf, task)
}

/// Returns what the reader captured, waiting for EOF no later than `grace`.
async fn collect_stream(buf: &OutputBuffer, mut task: JoinHandle<()>, grace: tokio::time::Instant) -> String {
    if tokio::time::timeout_at(grace, &mut task).await.is_err() {
        task.abort();
    }
    let captured = String::from_utf8_lossy(&buf.lock()).into_owned();
    captured
}

#[derive(Clone)]
pub struct RemediationGateway {
    executor: Arc<dyn RemediationExecutor>,
}

impl RemediationGateway {
    pub fn new(executor: Arc<dyn RemediationExecutor>) -> Self {
        Self { executor }
    }

    /// Restarts the remote desktop service on `target`.
    ///
    /// Not idempotent: every call issues a new restart attempt.
    pub async fn restart(&self, target: &str) -> RemediationResult {
        let target = target.trim();
        if target.is_empty() {
            return RemediationResult::InvalidRequest { reason: "target name required".into() };
        }

        let invocation = Uuid::new_v4();
        info!(%invocation, target, "starting RDP remediation");

        match self.executor.execute(target).await {
            Ok(out) if out.success => {
                let elapsed_ms = out.execution_time_ms as u64;
                info!(%invocation, target, elapsed_ms, "remediation succeeded");
                RemediationResult::Succeeded { output: out.stdout }
            }
            Ok(out) => {
                let elapsed_ms = out.execution_time_ms as u64;
                warn!(%invocation, target, exit_code = ?out.exit_code, elapsed_ms, "remediation command exited with failure");
                let diagnostics = if out.stderr.trim().is_empty() {
                    match out.exit_code {
                        Some(code) => format!("remediation command exited with status {code} and no error output"),
                        None => "remediation command was terminated by a signal and produced no error output".into(),
                    }
                } else {
                    out.stderr
                };
                RemediationResult::Failed { cause: FailureCause::Exit(out.exit_code), diagnostics }
            }
            Err(e @ ExecutionError::Launch { .. }) => {
                error!(%invocation, target, error = %e, "remediation command could not be launched");
                RemediationResult::Failed { cause: FailureCause::Launch, diagnostics: e.to_string() }
            }
            Err(e @ ExecutionError::Wait { .. }) => {
                error!(%invocation, target, error = %e, "lost track of remediation command");
                RemediationResult::Failed { cause: FailureCause::Wait, diagnostics: e.to_string() }
            }
            Err(ExecutionError::TimedOut(after)) => {
                warn!(%invocation, target, timeout_secs = after.as_secs(), "remediation timed out");
                RemediationResult::TimedOut { after }
            }
        }
    }
}
