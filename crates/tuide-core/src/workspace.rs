//! Workspace tracking: open files and the active file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::ExecutionContext;

/// Files open in a workspace, kept in open order, plus the active one.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    open_files: Vec<PathBuf>,
    open_set: HashSet<PathBuf>,
    active_file: Option<PathBuf>,
}

impl Workspace {
    /// Create a workspace rooted at `root`. The root is canonicalized when it exists.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            open_files: Vec::new(),
            open_set: HashSet::new(),
            active_file: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn active_file(&self) -> Option<&Path> {
        self.active_file.as_deref()
    }

    pub fn open_files(&self) -> &[PathBuf] {
        &self.open_files
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        joined.canonicalize().unwrap_or(joined)
    }

    /// Open a file and make it active.
    ///
    /// Returns `true` when the file was not open before. Paths that are not
    /// regular files are refused and leave the workspace unchanged.
    pub fn open(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path.as_ref());
        if !path.is_file() {
            warn!(path = %path.display(), "Cannot open non-existent or non-file path");
            return false;
        }

        let newly_opened = self.open_set.insert(path.clone());
        if newly_opened {
            self.open_files.push(path.clone());
        }
        debug!(path = %path.display(), newly_opened, "Activated file");
        self.active_file = Some(path);
        newly_opened
    }

    /// Close a file. Closing the active file activates the next file to focus.
    pub fn close(&mut self, path: impl AsRef<Path>) {
        let path = self.absolute(path.as_ref());
        if !self.open_set.remove(&path) {
            return;
        }
        self.open_files.retain(|p| p != &path);
        if self.active_file.as_deref() == Some(path.as_path()) {
            self.active_file = self.next_file_to_focus().map(Path::to_path_buf);
        }
    }

    /// Make a file active, opening it first if needed.
    ///
    /// Returns `true` only if the file had to be newly opened.
    pub fn set_active(&mut self, path: impl AsRef<Path>) -> bool {
        let path = self.absolute(path.as_ref());
        if !self.open_set.contains(&path) {
            return self.open(path);
        }
        if path.is_file() {
            self.active_file = Some(path);
        }
        false
    }

    pub fn is_open(&self, path: impl AsRef<Path>) -> bool {
        self.open_set.contains(&self.absolute(path.as_ref()))
    }

    /// The most recently opened file, if any.
    pub fn next_file_to_focus(&self) -> Option<&Path> {
        self.open_files.last().map(PathBuf::as_path)
    }

    /// Capture the execution context for the current state.
    pub fn context(&self) -> ExecutionContext {
        match &self.active_file {
            Some(file) => ExecutionContext::for_file(file, &self.root),
            None => ExecutionContext::for_workspace(&self.root),
        }
    }
}
