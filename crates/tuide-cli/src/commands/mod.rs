//! CLI command implementations.

pub mod action;
pub mod config;
pub mod new;
pub mod resolve;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tuide_config::{ConfigPaths, ConfigStore};
use tuide_core::{ExecutionContext, Workspace};

/// Shared state for one CLI invocation.
pub struct Env {
    pub workspace_root: PathBuf,
    pub cwd: Option<PathBuf>,
    pub store: Arc<ConfigStore>,
}

impl Env {
    pub fn new(
        workspace: Option<PathBuf>,
        cwd: Option<PathBuf>,
        system_config: Option<PathBuf>,
        user_config: Option<PathBuf>,
        project_config: Option<PathBuf>,
    ) -> Result<Self> {
        let workspace_root = match workspace {
            Some(root) => root,
            None => std::env::current_dir().context("Failed to read the current directory")?,
        };
        let workspace_root = workspace_root
            .canonicalize()
            .with_context(|| format!("Workspace not found: {}", workspace_root.display()))?;

        let mut paths = ConfigPaths::discover(&workspace_root);
        if let Some(path) = system_config {
            paths = paths.with_system(path);
        }
        if let Some(path) = user_config {
            paths = paths.with_user(path);
        }
        if let Some(path) = project_config {
            paths = paths.with_project(path);
        }

        Ok(Self {
            workspace_root,
            cwd,
            store: Arc::new(ConfigStore::load(paths)),
        })
    }

    /// Capture the placeholder context, with `file` as the active file.
    ///
    /// A file that does not exist yet still provides its path-derived
    /// values; it just is not opened in the workspace.
    pub fn context(&self, file: Option<&Path>) -> ExecutionContext {
        let mut workspace = Workspace::new(&self.workspace_root);
        match file {
            Some(file) if workspace.open(file) => workspace.context(),
            Some(file) => ExecutionContext::for_file(file, workspace.root()),
            None => workspace.context(),
        }
    }
}
