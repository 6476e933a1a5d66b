//! Per-invocation execution context.
//!
//! The surrounding application captures one `ExecutionContext` right before
//! each action. It carries the path-derived facts placeholder resolution can
//! read:
//! - `%current_file_name%` - file name of the active file
//! - `%current_file_path%` - absolute path of the active file
//! - `%current_dir%` - directory containing the active file
//! - `%workspace_root%` - workspace root directory

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Identifiers recognized as fixed context tokens.
pub const CONTEXT_IDENTIFIERS: [&str; 4] = [
    "current_file_name",
    "current_file_path",
    "current_dir",
    "workspace_root",
];

/// Path facts for one resolution. Empty strings mean "no active file".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub current_file_name: String,
    pub current_file_path: String,
    pub current_dir: String,
    pub workspace_root: String,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Context with a workspace root and no active file.
    pub fn for_workspace(workspace_root: impl AsRef<Path>) -> Self {
        Self {
            workspace_root: workspace_root.as_ref().to_string_lossy().into_owned(),
            ..Self::default()
        }
    }

    /// Context for an active file. Relative paths are taken relative to the
    /// workspace root.
    pub fn for_file(file: impl AsRef<Path>, workspace_root: impl AsRef<Path>) -> Self {
        let root = workspace_root.as_ref();
        let file = file.as_ref();
        let absolute: PathBuf = if file.is_absolute() {
            file.to_path_buf()
        } else {
            root.join(file)
        };

        Self {
            current_file_name: absolute
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            current_dir: absolute
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            current_file_path: absolute.to_string_lossy().into_owned(),
            workspace_root: root.to_string_lossy().into_owned(),
        }
    }

    pub fn with_current_file_name(mut self, name: impl Into<String>) -> Self {
        self.current_file_name = name.into();
        self
    }

    pub fn with_current_file_path(mut self, path: impl Into<String>) -> Self {
        self.current_file_path = path.into();
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<String>) -> Self {
        self.current_dir = dir.into();
        self
    }

    pub fn with_workspace_root(mut self, root: impl Into<String>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// Look up a fixed context identifier.
    pub fn lookup(&self, identifier: &str) -> Option<&str> {
        match identifier {
            "current_file_name" => Some(&self.current_file_name),
            "current_file_path" => Some(&self.current_file_path),
            "current_dir" => Some(&self.current_dir),
            "workspace_root" => Some(&self.workspace_root),
            _ => None,
        }
    }

    pub fn has_file(&self) -> bool {
        !self.current_file_path.is_empty()
    }

    pub fn file_dir(&self) -> Option<&Path> {
        (!self.current_dir.is_empty()).then(|| Path::new(self.current_dir.as_str()))
    }

    pub fn workspace_dir(&self) -> Option<&Path> {
        (!self.workspace_root.is_empty()).then(|| Path::new(self.workspace_root.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_file_derives_name_and_dir() {
        let ctx = ExecutionContext::for_file("/tmp/proj/src/x.py", "/tmp/proj");
        assert_eq!(ctx.current_file_name, "x.py");
        assert_eq!(ctx.current_file_path, "/tmp/proj/src/x.py");
        assert_eq!(ctx.current_dir, "/tmp/proj/src");
        assert_eq!(ctx.workspace_root, "/tmp/proj");
    }

    #[test]
    fn relative_file_joins_workspace_root() {
        let ctx = ExecutionContext::for_file("src/main.rs", "/work");
        assert_eq!(ctx.current_file_path, "/work/src/main.rs");
        assert_eq!(ctx.current_dir, "/work/src");
    }

    #[test]
    fn workspace_only_has_empty_file_fields() {
        let ctx = ExecutionContext::for_workspace("/work");
        assert!(!ctx.has_file());
        assert_eq!(ctx.lookup("current_file_path"), Some(""));
        assert_eq!(ctx.lookup("workspace_root"), Some("/work"));
        assert!(ctx.file_dir().is_none());
    }

    #[test]
    fn lookup_rejects_unknown_identifiers() {
        let ctx = ExecutionContext::new();
        assert_eq!(ctx.lookup("bogus"), None);
        for ident in CONTEXT_IDENTIFIERS {
            assert!(ctx.lookup(ident).is_some());
        }
    }
}
