//! Run an action and stream its output.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tuide_core::runner::{ExitOutcome, OutputStream};
use tuide_runner::LocalRunner;
use tuide_session::{Action, ActionEvent, ActionRequest, Dispatcher};

use super::Env;

/// Resolve `action`, run it, and print its output as it arrives.
///
/// Ctrl-C cancels the command. The exit code mirrors the child's.
pub async fn run(
    env: &Env,
    action: Action,
    file: Option<PathBuf>,
    language: Option<String>,
) -> Result<ExitCode> {
    let dispatcher = Dispatcher::new(Arc::new(LocalRunner::new()), env.store.subscribe());

    let mut request = ActionRequest::new(env.context(file.as_deref()));
    request.language = language;
    request.working_dir = env.cwd.clone();

    let mut run = dispatcher
        .execute(&action, &request)
        .await
        .with_context(|| format!("Failed to start {}", action))?;

    let mut ctrl_c = Box::pin(tokio::signal::ctrl_c());
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = run.next_event() => {
                let Some(event) = event else { break };
                print_event(event);
            }
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                eprintln!("Cancelling...");
                run.cancel();
            }
        }
    }

    let outcome = run
        .task
        .await
        .context("Action task failed")?
        .with_context(|| format!("Failed to run {}", action))?;

    Ok(ExitCode::from(exit_status(outcome)))
}

fn print_event(event: ActionEvent) {
    match event {
        ActionEvent::Started { .. } => {}
        ActionEvent::Output(chunk) => match chunk.stream {
            OutputStream::Stdout => {
                let mut out = std::io::stdout().lock();
                let _ = writeln!(out, "{}", chunk.content);
            }
            OutputStream::Stderr => eprintln!("{}", chunk.content),
            OutputStream::System => eprintln!("[tuide] {}", chunk.content),
        },
        ActionEvent::Finished { outcome, .. } => {
            if outcome.is_cancelled() {
                eprintln!("[tuide] {}", outcome);
            }
        }
    }
}

/// Shell-style status: the exit code, or 128 plus the signal number.
fn exit_status(outcome: ExitOutcome) -> u8 {
    match outcome {
        ExitOutcome::Exited { code } => u8::try_from(code).unwrap_or(1),
        ExitOutcome::Signaled { signal } => (128 + signal).clamp(0, 255) as u8,
        ExitOutcome::Cancelled => 130,
    }
}
