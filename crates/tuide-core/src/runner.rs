//! Runner trait and run types.
//!
//! Runners execute a resolved command line as an external process. Output
//! arrives as a sequence of chunks while the process runs, and every run ends
//! in exactly one `ExitOutcome`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::{Error, Result, RunId};

/// Default time between the graceful stop signal and the forced kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// How the resolved command line is turned into a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Hand the whole line to the platform shell.
    #[default]
    Shell,
    /// Split the line into program and arguments and exec directly.
    Direct,
}

/// Specification for one command run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Unique identifier for this run.
    pub id: RunId,
    /// Fully resolved command line.
    pub command: String,
    /// Working directory for the child process.
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: HashMap<String, String>,
    pub mode: ExecMode,
    /// Time to wait after the graceful stop signal before killing.
    pub grace_period: Duration,
}

impl CommandSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: RunId::new(),
            command: command.into(),
            working_dir: None,
            env: HashMap::new(),
            mode: ExecMode::default(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_mode(mut self, mode: ExecMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputStream {
    Stdout,
    Stderr,
    /// Lines produced by the runner itself (command echo, status).
    System,
}

/// One line of output from a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputChunk {
    pub timestamp: DateTime<Utc>,
    pub stream: OutputStream,
    pub content: String,
}

impl OutputChunk {
    pub fn new(stream: OutputStream, content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            stream,
            content: content.into(),
        }
    }

    pub fn stdout(content: impl Into<String>) -> Self {
        Self::new(OutputStream::Stdout, content)
    }

    pub fn stderr(content: impl Into<String>) -> Self {
        Self::new(OutputStream::Stderr, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(OutputStream::System, content)
    }
}

/// How a run terminated.
///
/// A nonzero exit code is data, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitOutcome {
    Exited { code: i32 },
    Signaled { signal: i32 },
    Cancelled,
}

impl ExitOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ExitOutcome::Exited { code: 0 })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExitOutcome::Cancelled)
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            ExitOutcome::Exited { code } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitOutcome::Exited { code: 0 } => write!(f, "finished successfully (exit code 0)"),
            ExitOutcome::Exited { code } => write!(f, "failed (exit code {})", code),
            ExitOutcome::Signaled { signal } => write!(f, "terminated by signal {}", signal),
            ExitOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Receives output chunks as they arrive.
pub trait OutputSink {
    fn accept(&mut self, chunk: OutputChunk);
}

impl<F> OutputSink for F
where
    F: FnMut(OutputChunk),
{
    fn accept(&mut self, chunk: OutputChunk) {
        self(chunk)
    }
}

impl OutputSink for Vec<OutputChunk> {
    fn accept(&mut self, chunk: OutputChunk) {
        self.push(chunk);
    }
}

/// Requests cancellation of one run. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Canceller {
    tx: Arc<watch::Sender<bool>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Create a linked canceller / cancellation receiver pair.
pub fn cancellation() -> (Canceller, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (Canceller { tx: Arc::new(tx) }, rx)
}

/// Handle to a running command.
pub struct RunHandle {
    pub id: RunId,
    output: mpsc::Receiver<OutputChunk>,
    canceller: Canceller,
    task: JoinHandle<Result<ExitOutcome>>,
}

impl RunHandle {
    pub fn new(
        id: RunId,
        output: mpsc::Receiver<OutputChunk>,
        canceller: Canceller,
        task: JoinHandle<Result<ExitOutcome>>,
    ) -> Self {
        Self {
            id,
            output,
            canceller,
            task,
        }
    }

    /// Next output chunk, or `None` once the output is closed or the run
    /// was cancelled. Chunks still queued at cancellation are discarded.
    pub async fn next_output(&mut self) -> Option<OutputChunk> {
        if self.canceller.is_cancelled() {
            return None;
        }
        let chunk = self.output.recv().await?;
        if self.canceller.is_cancelled() {
            return None;
        }
        Some(chunk)
    }

    /// Request cancellation: graceful stop first, forced kill after the grace period.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Wait for the run to finish. Pending output is discarded.
    pub async fn wait(self) -> Result<ExitOutcome> {
        drop(self.output);
        self.task
            .await
            .map_err(|e| Error::ExecutionFailed(format!("run task failed: {}", e)))?
    }

    /// Forward all output to `sink`, then return the outcome.
    ///
    /// Forwarding stops as soon as the run is cancelled.
    pub async fn drain_into(mut self, sink: &mut (dyn OutputSink + Send)) -> Result<ExitOutcome> {
        while let Some(chunk) = self.next_output().await {
            sink.accept(chunk);
        }
        self.wait().await
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.id)
            .field("cancelled", &self.canceller.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Trait for command runners.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Name of this runner.
    fn name(&self) -> &'static str;

    /// Spawn the command and return a handle to its output and outcome.
    async fn spawn(&self, spec: CommandSpec) -> Result<RunHandle>;

    /// Spawn the command and stream its output into `sink` until it exits.
    async fn run(
        &self,
        spec: CommandSpec,
        sink: &mut (dyn OutputSink + Send),
    ) -> Result<ExitOutcome> {
        let handle = self.spawn(spec).await?;
        handle.drain_into(sink).await
    }
}
