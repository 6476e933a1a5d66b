//! Local process runner.

use async_trait::async_trait;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use tuide_core::runner::{
    CommandSpec, ExecMode, ExitOutcome, OutputChunk, OutputStream, RunHandle, Runner, cancellation,
};
use tuide_core::{Error, Result, RunId};

use crate::split::split;

const DEFAULT_BUFFER: usize = 256;

/// Runs commands as child processes of the current process.
#[derive(Debug, Clone)]
pub struct LocalRunner {
    buffer: usize,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self {
            buffer: DEFAULT_BUFFER,
        }
    }

    /// Output chunks buffered before the child is paused on a full channel.
    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.max(1);
        self
    }

    /// Build the process for a command line. Returns the program name for
    /// error reporting alongside the command.
    fn command(line: &str, mode: ExecMode) -> Result<(String, Command)> {
        match mode {
            ExecMode::Shell => {
                let (shell, flag) = shell();
                let mut command = Command::new(shell);
                command.arg(flag).arg(line);
                Ok((shell.to_string(), command))
            }
            ExecMode::Direct => {
                let mut words = split(line)?.into_iter();
                let program = words.next().ok_or(Error::EmptyCommand)?;
                let mut command = Command::new(&program);
                command.args(words);
                Ok((program, command))
            }
        }
    }
}

impl Default for LocalRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(unix)]
fn shell() -> (&'static str, &'static str) {
    ("sh", "-c")
}

#[cfg(windows)]
fn shell() -> (&'static str, &'static str) {
    ("cmd", "/C")
}

#[async_trait]
impl Runner for LocalRunner {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn spawn(&self, spec: CommandSpec) -> Result<RunHandle> {
        let line = spec.command.trim();
        if line.is_empty() {
            return Err(Error::EmptyCommand);
        }

        let (program, mut command) = Self::command(line, spec.mode)?;

        if let Some(ref dir) = spec.working_dir {
            if !dir.is_dir() {
                return Err(Error::InvalidInput(format!(
                    "working directory does not exist: {}",
                    dir.display()
                )));
            }
            command.current_dir(dir);
        }

        command
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so stop signals also reach what the shell starts.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|e| Error::from_spawn(&program, e))?;

        info!(
            run_id = %spec.id,
            command = %line,
            pid = ?child.id(),
            "Spawned command"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExecutionFailed("stderr was not captured".to_string()))?;

        let (tx, rx) = mpsc::channel(self.buffer);
        let (canceller, cancel_rx) = cancellation();

        let _ = tx.send(OutputChunk::system(format!("$ {}", line))).await;

        let supervisor = Supervisor {
            child,
            output: Output {
                id: spec.id,
                tx,
                cancel_rx: cancel_rx.clone(),
            },
            cancel_rx,
            grace_period: spec.grace_period,
        };
        let task = tokio::spawn(supervisor.run(BufReader::new(stdout), BufReader::new(stderr)));

        Ok(RunHandle::new(spec.id, rx, canceller, task))
    }
}

/// Sending half of one run's output.
struct Output {
    id: RunId,
    tx: mpsc::Sender<OutputChunk>,
    cancel_rx: watch::Receiver<bool>,
}

impl Output {
    /// Queue a chunk. Gives up once the run is cancelled, even when the
    /// channel is full.
    async fn send(&self, chunk: OutputChunk) {
        tokio::select! {
            biased;
            _ = cancelled(self.cancel_rx.clone()) => {}
            // A dropped receiver only means nobody is listening.
            _ = self.tx.send(chunk) => {}
        }
    }

    /// Send what `read_until` left in `buf`. Returns whether the stream is
    /// still open.
    async fn forward(
        &self,
        read: io::Result<usize>,
        buf: &mut Vec<u8>,
        stream: OutputStream,
    ) -> bool {
        match read {
            Ok(0) => {
                // A read interrupted by another branch can leave an
                // unterminated last line behind.
                if !buf.is_empty() {
                    self.send_line(buf, stream).await;
                }
                false
            }
            Ok(_) => {
                self.send_line(buf, stream).await;
                true
            }
            Err(e) => {
                warn!(run_id = %self.id, stream = ?stream, error = %e, "Error reading output");
                false
            }
        }
    }

    async fn send_line(&self, buf: &mut Vec<u8>, stream: OutputStream) {
        let line = String::from_utf8_lossy(buf)
            .trim_end_matches(['\n', '\r'])
            .to_string();
        buf.clear();
        self.send(OutputChunk::new(stream, line)).await;
    }
}

/// Resolves once cancellation is requested. Never resolves if every
/// canceller is gone.
async fn cancelled(mut cancel_rx: watch::Receiver<bool>) {
    while !*cancel_rx.borrow_and_update() {
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Owns one child process until it exits or is cancelled.
struct Supervisor {
    child: Child,
    output: Output,
    cancel_rx: watch::Receiver<bool>,
    grace_period: Duration,
}

impl Supervisor {
    async fn run<O, E>(mut self, mut stdout: O, mut stderr: E) -> Result<ExitOutcome>
    where
        O: AsyncBufRead + Unpin,
        E: AsyncBufRead + Unpin,
    {
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut stdout_open = true;
        let mut stderr_open = true;
        let mut cancel_open = true;

        // Partial reads stay in the buffers when another branch wins, so
        // the loop can resume each read where it stopped.
        while stdout_open || stderr_open {
            if *self.cancel_rx.borrow() {
                return self.cancel().await;
            }

            tokio::select! {
                read = stdout.read_until(b'\n', &mut out_buf), if stdout_open => {
                    stdout_open = self.output.forward(read, &mut out_buf, OutputStream::Stdout).await;
                }
                read = stderr.read_until(b'\n', &mut err_buf), if stderr_open => {
                    stderr_open = self.output.forward(read, &mut err_buf, OutputStream::Stderr).await;
                }
                changed = self.cancel_rx.changed(), if cancel_open => {
                    cancel_open = changed.is_ok();
                }
            }
        }

        let status = loop {
            if *self.cancel_rx.borrow() {
                return self.cancel().await;
            }

            tokio::select! {
                status = self.child.wait() => break status?,
                changed = self.cancel_rx.changed(), if cancel_open => {
                    cancel_open = changed.is_ok();
                }
            }
        };

        let outcome = exit_outcome(status);
        info!(run_id = %self.output.id, outcome = %outcome, "Command finished");
        self.output.send(OutputChunk::system(outcome.to_string())).await;
        Ok(outcome)
    }

    /// Stop the child: graceful signal, then a kill once the grace period ends.
    async fn cancel(mut self) -> Result<ExitOutcome> {
        let id = self.output.id;
        info!(run_id = %id, "Cancelling command");
        terminate(&mut self.child);

        match tokio::time::timeout(self.grace_period, self.child.wait()).await {
            Ok(status) => {
                debug!(run_id = %id, status = ?status, "Command stopped after signal");
            }
            Err(_) => {
                warn!(
                    run_id = %id,
                    grace_ms = self.grace_period.as_millis() as u64,
                    "Command ignored stop signal, killing"
                );
                force_kill(&mut self.child).await?;
            }
        }

        Ok(ExitOutcome::Cancelled)
    }
}

#[cfg(unix)]
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    use nix::sys::signal::killpg;
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), signal) {
            debug!(pid, signal = ?signal, error = %e, "Signalling process group failed");
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGTERM);
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}

async fn force_kill(child: &mut Child) -> io::Result<()> {
    #[cfg(unix)]
    signal_group(child, nix::sys::signal::Signal::SIGKILL);
    child.kill().await
}

fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    if let Some(code) = status.code() {
        return ExitOutcome::Exited { code };
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return ExitOutcome::Signaled { signal };
        }
    }

    ExitOutcome::Exited { code: -1 }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;
    use tempfile::TempDir;

    fn spec(command: &str) -> CommandSpec {
        CommandSpec::new(command)
    }

    async fn collect(spec: CommandSpec) -> (Vec<OutputChunk>, ExitOutcome) {
        let mut chunks = Vec::new();
        let outcome = LocalRunner::new().run(spec, &mut chunks).await.unwrap();
        (chunks, outcome)
    }

    fn lines(chunks: &[OutputChunk], stream: OutputStream) -> Vec<&str> {
        chunks
            .iter()
            .filter(|c| c.stream == stream)
            .map(|c| c.content.as_str())
            .collect()
    }

    #[tokio::test]
    async fn echo_succeeds_with_framing() {
        let (chunks, outcome) = collect(spec("  echo hello  ")).await;
        assert_eq!(outcome, ExitOutcome::Exited { code: 0 });
        assert_eq!(lines(&chunks, OutputStream::Stdout), vec!["hello"]);

        let system = lines(&chunks, OutputStream::System);
        assert_eq!(system.first(), Some(&"$ echo hello"));
        assert_eq!(system.last(), Some(&"finished successfully (exit code 0)"));
        assert_eq!(chunks.first().unwrap().stream, OutputStream::System);
        assert_eq!(chunks.last().unwrap().stream, OutputStream::System);
    }

    #[tokio::test]
    async fn nonzero_exit_is_an_outcome_not_an_error() {
        let (chunks, outcome) = collect(spec("exit 3")).await;
        assert_eq!(outcome, ExitOutcome::Exited { code: 3 });
        assert_eq!(
            lines(&chunks, OutputStream::System).last(),
            Some(&"failed (exit code 3)")
        );
    }

    #[tokio::test]
    async fn stderr_is_tagged() {
        let (chunks, _) = collect(spec("echo out; echo err >&2")).await;
        assert_eq!(lines(&chunks, OutputStream::Stdout), vec!["out"]);
        assert_eq!(lines(&chunks, OutputStream::Stderr), vec!["err"]);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let (chunks, _) = collect(spec(r"printf 'a\377b\n'")).await;
        assert_eq!(lines(&chunks, OutputStream::Stdout), vec!["a\u{FFFD}b"]);
    }

    #[tokio::test]
    async fn trailing_line_without_newline_is_delivered() {
        let (chunks, _) = collect(spec("printf 'one\\ntwo'")).await;
        assert_eq!(lines(&chunks, OutputStream::Stdout), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn output_streams_before_exit() {
        let mut handle = LocalRunner::new()
            .spawn(spec("echo first; sleep 1; echo second"))
            .await
            .unwrap();

        let started = Instant::now();
        let mut first_at = None;
        while let Some(chunk) = handle.next_output().await {
            if chunk.content == "first" {
                first_at = Some(started.elapsed());
                break;
            }
        }
        assert!(first_at.unwrap() < Duration::from_millis(900));

        let mut rest = Vec::new();
        let outcome = handle.drain_into(&mut rest).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(lines(&rest, OutputStream::Stdout), vec!["second"]);
        assert!(started.elapsed() >= Duration::from_millis(900));
    }

    #[tokio::test]
    async fn empty_command_is_refused() {
        let err = LocalRunner::new().spawn(spec("   ")).await.unwrap_err();
        assert!(matches!(err, Error::EmptyCommand));
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let err = LocalRunner::new()
            .spawn(spec("definitely-not-a-real-program-xyz --flag").with_mode(ExecMode::Direct))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(ref p) if p == "definitely-not-a-real-program-xyz"));
    }

    #[tokio::test]
    async fn missing_program_through_shell_exits_127() {
        let (_, outcome) = collect(spec("definitely-not-a-real-program-xyz")).await;
        assert_eq!(outcome, ExitOutcome::Exited { code: 127 });
    }

    #[tokio::test]
    async fn direct_mode_passes_arguments_verbatim() {
        let (chunks, outcome) =
            collect(spec("printf '%s|' 'a b' c").with_mode(ExecMode::Direct)).await;
        assert!(outcome.is_success());
        assert_eq!(lines(&chunks, OutputStream::Stdout), vec!["a b|c|"]);
    }

    #[tokio::test]
    async fn working_dir_and_env_apply() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        let (chunks, _) = collect(
            spec("pwd -P; echo $TUIDE_TEST_VAR")
                .with_working_dir(dir.path())
                .with_env("TUIDE_TEST_VAR", "set"),
        )
        .await;
        assert_eq!(
            lines(&chunks, OutputStream::Stdout),
            vec![canonical.to_str().unwrap(), "set"]
        );
    }

    #[tokio::test]
    async fn missing_working_dir_is_invalid_input() {
        let err = LocalRunner::new()
            .spawn(spec("true").with_working_dir("/definitely/not/here"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn cancel_stops_output_and_reports_cancelled() {
        let mut handle = LocalRunner::new().spawn(spec("yes tick")).await.unwrap();

        while let Some(chunk) = handle.next_output().await {
            if chunk.content == "tick" {
                break;
            }
        }
        handle.cancel();

        let started = Instant::now();
        let mut after = Vec::new();
        let outcome = handle.drain_into(&mut after).await.unwrap();
        assert_eq!(outcome, ExitOutcome::Cancelled);
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(after.is_empty(), "{} chunks after cancel", after.len());
    }

    #[tokio::test]
    async fn cancel_stops_commands_started_by_the_shell() {
        let dir = TempDir::new().unwrap();
        let mut handle = LocalRunner::new()
            .spawn(
                spec("(sleep 0.5; echo late > marker) & echo ready; wait")
                    .with_working_dir(dir.path()),
            )
            .await
            .unwrap();

        while let Some(chunk) = handle.next_output().await {
            if chunk.content == "ready" {
                break;
            }
        }
        handle.cancel();
        assert_eq!(handle.wait().await.unwrap(), ExitOutcome::Cancelled);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(!dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn eof_flushes_an_unterminated_line() {
        let (tx, mut rx) = mpsc::channel(4);
        let (_canceller, cancel_rx) = cancellation();
        let output = Output {
            id: RunId::new(),
            tx,
            cancel_rx,
        };

        let mut buf = b"two".to_vec();
        assert!(!output.forward(Ok(0), &mut buf, OutputStream::Stdout).await);
        assert!(buf.is_empty());
        assert!(!output.forward(Ok(0), &mut buf, OutputStream::Stdout).await);
        drop(output);

        assert_eq!(rx.recv().await.unwrap().content, "two");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn cancel_unblocks_a_full_channel() {
        let (tx, _rx) = mpsc::channel(1);
        let (canceller, cancel_rx) = cancellation();
        let output = Output {
            id: RunId::new(),
            tx,
            cancel_rx,
        };

        output.send(OutputChunk::stdout("fills")).await;
        canceller.cancel();
        tokio::time::timeout(Duration::from_secs(1), output.send(OutputChunk::stdout("dropped")))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_kills_after_grace_period() {
        let mut handle = LocalRunner::new()
            .spawn(
                spec("trap '' TERM; echo ready; while true; do sleep 0.05; done")
                    .with_grace_period(Duration::from_millis(200)),
            )
            .await
            .unwrap();

        while let Some(chunk) = handle.next_output().await {
            if chunk.content == "ready" {
                break;
            }
        }
        handle.cancel();

        let started = Instant::now();
        let outcome = handle.wait().await.unwrap();
        assert_eq!(outcome, ExitOutcome::Cancelled);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn signaled_exit_is_reported() {
        let (_, outcome) = collect(spec("kill -KILL $$")).await;
        assert_eq!(outcome, ExitOutcome::Signaled { signal: 9 });
    }

    #[tokio::test]
    async fn concurrent_runs_are_independent() {
        let runner = Arc::new(LocalRunner::new());
        let mut tasks = Vec::new();
        for i in 0..4 {
            let runner = Arc::clone(&runner);
            tasks.push(tokio::spawn(async move {
                let mut chunks = Vec::new();
                let outcome = runner
                    .run(spec(&format!("echo run-{}; exit {}", i, i)), &mut chunks)
                    .await
                    .unwrap();
                (i, chunks, outcome)
            }));
        }

        for task in tasks {
            let (i, chunks, outcome) = task.await.unwrap();
            assert_eq!(outcome, ExitOutcome::Exited { code: i });
            let expected = format!("run-{}", i);
            assert_eq!(lines(&chunks, OutputStream::Stdout), vec![expected.as_str()]);
        }
    }
}
