//! Action dispatcher - resolves an action's template and hands it to a runner.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tuide_config::MergedConfig;
use tuide_config::placeholder::{Resolver, mentions};
use tuide_core::runner::{
    Canceller, CommandSpec, ExecMode, ExitOutcome, OutputChunk, RunHandle, Runner,
};
use tuide_core::{Error, ExecutionContext, RunId};

use crate::action::Action;
use crate::error::ActionResult;

/// Inputs for one action, captured right before it runs.
#[derive(Debug, Clone, Default)]
pub struct ActionRequest {
    pub context: ExecutionContext,
    /// Language override for run/debug/test.
    pub language: Option<String>,
    /// Working directory override.
    pub working_dir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl ActionRequest {
    pub fn new(context: ExecutionContext) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// A resolved action, ready to spawn.
#[derive(Debug, Clone)]
pub struct PreparedAction {
    pub action: Action,
    /// The template before resolution.
    pub template: String,
    pub spec: CommandSpec,
}

/// Event emitted while an action runs.
#[derive(Debug, Clone)]
pub enum ActionEvent {
    Started {
        run_id: RunId,
        action: String,
        command: String,
    },
    Output(OutputChunk),
    Finished {
        run_id: RunId,
        outcome: ExitOutcome,
    },
}

/// A running action: its events, a way to cancel it, and its final outcome.
pub struct ActionRun {
    pub run_id: RunId,
    events: mpsc::Receiver<ActionEvent>,
    pub canceller: Canceller,
    pub task: JoinHandle<ActionResult<ExitOutcome>>,
}

impl ActionRun {
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    /// Next event, or `None` after `Finished`. Once the run is cancelled,
    /// queued output is skipped and only `Finished` is still delivered.
    pub async fn next_event(&mut self) -> Option<ActionEvent> {
        loop {
            let event = self.events.recv().await?;
            if matches!(event, ActionEvent::Output(_)) && self.canceller.is_cancelled() {
                continue;
            }
            return Some(event);
        }
    }
}

/// Turns actions into runs.
///
/// Every action reads the latest config snapshot, so a reload between two
/// actions is picked up by the second one.
pub struct Dispatcher {
    runner: Arc<dyn Runner>,
    config: watch::Receiver<Arc<MergedConfig>>,
}

impl Dispatcher {
    pub fn new(runner: Arc<dyn Runner>, config: watch::Receiver<Arc<MergedConfig>>) -> Self {
        Self { runner, config }
    }

    /// Dispatcher over a fixed config snapshot.
    pub fn with_snapshot(runner: Arc<dyn Runner>, config: Arc<MergedConfig>) -> Self {
        let (_tx, rx) = watch::channel(config);
        Self::new(runner, rx)
    }

    pub fn config(&self) -> Arc<MergedConfig> {
        self.config.borrow().clone()
    }

    /// Resolve the action into a command spec without running it.
    pub fn prepare(&self, action: &Action, request: &ActionRequest) -> ActionResult<PreparedAction> {
        let config = self.config();
        let context = &request.context;

        let template = action.template(&config, context, request.language.as_deref())?;
        let resolved = Resolver::new(context, &config).resolve(&template)?;
        let command = resolved.trim();
        if command.is_empty() {
            return Err(Error::EmptyCommand.into());
        }

        let settings = config.runner_settings()?;
        let mode = if settings.shell {
            ExecMode::Shell
        } else {
            ExecMode::Direct
        };

        let mut spec = CommandSpec::new(command)
            .with_mode(mode)
            .with_grace_period(settings.grace_period());
        spec.env = request.env.clone();
        if let Some(dir) = working_dir(&template, context, request.working_dir.as_deref()) {
            spec = spec.with_working_dir(dir);
        }

        debug!(
            action = %action,
            template = %template,
            command = %spec.command,
            working_dir = ?spec.working_dir,
            "Prepared action"
        );

        Ok(PreparedAction {
            action: action.clone(),
            template,
            spec,
        })
    }

    /// Resolve and spawn, returning the raw run handle.
    pub async fn dispatch(&self, action: &Action, request: &ActionRequest) -> ActionResult<RunHandle> {
        let prepared = self.prepare(action, request)?;
        info!(
            action = %action,
            run_id = %prepared.spec.id,
            runner = self.runner.name(),
            "Dispatching action"
        );
        Ok(self.runner.spawn(prepared.spec).await?)
    }

    /// Resolve and spawn, returning a channel of events and a handle to the
    /// final outcome.
    ///
    /// Resolution and spawn failures are returned before anything runs.
    pub async fn execute(&self, action: &Action, request: &ActionRequest) -> ActionResult<ActionRun> {
        let prepared = self.prepare(action, request)?;
        let run_id = prepared.spec.id;
        let command = prepared.spec.command.clone();
        let handle = self.runner.spawn(prepared.spec).await?;
        let canceller = handle.canceller();

        let (tx, rx) = mpsc::channel(100);
        let label = action.to_string();
        let task = tokio::spawn(async move {
            Self::execute_inner(run_id, label, command, handle, tx).await
        });

        Ok(ActionRun {
            run_id,
            events: rx,
            canceller,
            task,
        })
    }

    async fn execute_inner(
        run_id: RunId,
        action: String,
        command: String,
        mut handle: RunHandle,
        tx: mpsc::Sender<ActionEvent>,
    ) -> ActionResult<ExitOutcome> {
        let _ = tx
            .send(ActionEvent::Started {
                run_id,
                action: action.clone(),
                command,
            })
            .await;

        while let Some(chunk) = handle.next_output().await {
            let _ = tx.send(ActionEvent::Output(chunk)).await;
        }

        let outcome = handle.wait().await?;
        if outcome.is_success() {
            info!(action = %action, run_id = %run_id, "Action finished");
        } else {
            warn!(action = %action, run_id = %run_id, outcome = %outcome, "Action did not succeed");
        }

        let _ = tx.send(ActionEvent::Finished { run_id, outcome }).await;
        Ok(outcome)
    }
}

/// Pick the working directory for a template.
///
/// An explicit override wins. Otherwise a template that names
/// `%workspace_root%`, or does not name `%current_dir%`, runs in the
/// workspace root and one naming only `%current_dir%` runs in the file's
/// directory. Missing directories fall back to the other one, then to the
/// process working directory (`None`).
pub fn working_dir(
    template: &str,
    context: &ExecutionContext,
    override_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(dir) = override_dir {
        return Some(dir.to_path_buf());
    }

    let prefer_file_dir =
        mentions(template, "current_dir") && !mentions(template, "workspace_root");
    let preferred = if prefer_file_dir {
        context.file_dir()
    } else {
        context.workspace_dir()
    };

    preferred
        .or_else(|| context.file_dir())
        .or_else(|| context.workspace_dir())
        .map(Path::to_path_buf)
}
