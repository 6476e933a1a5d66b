//! Session-level config holder.
//!
//! `ConfigStore` owns the current `MergedConfig` snapshot. Rebuilding never
//! mutates a published tree: `reload` merges fresh sources into a new
//! snapshot and swaps it in, so callers that already hold an `Arc` keep the
//! snapshot they started with.

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ConfigResult;
use crate::merge::merge;
use crate::merged::MergedConfig;
use crate::source::ConfigPaths;

pub struct ConfigStore {
    paths: ConfigPaths,
    tx: watch::Sender<Arc<MergedConfig>>,
}

impl ConfigStore {
    /// Load every tier and publish the first snapshot.
    pub fn load(paths: ConfigPaths) -> Self {
        let merged = Arc::new(merge(paths.load_sources()));
        let (tx, _rx) = watch::channel(merged);
        Self { paths, tx }
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<MergedConfig> {
        self.tx.borrow().clone()
    }

    /// Rebuild from disk and publish the new snapshot.
    pub fn reload(&self) -> Arc<MergedConfig> {
        let merged = Arc::new(merge(self.paths.load_sources()));
        self.tx.send_replace(Arc::clone(&merged));
        info!(sources = merged.origins().len(), "Config reloaded");
        merged
    }

    /// Receive every snapshot published after this call.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MergedConfig>> {
        self.tx.subscribe()
    }

    /// Reload whenever one of the source files changes.
    ///
    /// Parent directories are watched so files created after startup are
    /// picked up. Watching stops when the returned guard is dropped.
    pub fn watch(self: &Arc<Self>) -> ConfigResult<ConfigWatcher> {
        let mut targets: Vec<PathBuf> = Vec::new();
        let mut dirs = BTreeSet::new();
        for (_, path) in self.paths.tiers() {
            targets.push(path.to_path_buf());
            let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
                continue;
            };
            if !parent.is_dir() {
                debug!(dir = %parent.display(), "Config directory missing, not watching");
                continue;
            }
            if let Ok(canonical) = parent.canonicalize() {
                targets.push(canonical.join(name));
            }
            dirs.insert(parent.to_path_buf());
        }

        let store = Arc::clone(self);
        let mut watcher =
            notify::recommended_watcher(move |result: notify::Result<notify::Event>| {
                match result {
                    Ok(event) => {
                        if matches!(event.kind, EventKind::Access(_)) {
                            return;
                        }
                        if event.paths.iter().any(|p| targets.contains(p)) {
                            debug!(paths = ?event.paths, "Config source changed");
                            store.reload();
                        }
                    }
                    Err(e) => warn!(error = %e, "Config watch error"),
                }
            })?;

        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }
        info!(dirs = dirs.len(), "Watching config sources");

        Ok(ConfigWatcher { _watcher: watcher })
    }
}

/// Keeps a config watch alive.
pub struct ConfigWatcher {
    _watcher: RecommendedWatcher,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> ConfigPaths {
        ConfigPaths::default()
            .with_system(dir.path().join("system.json"))
            .with_user(dir.path().join("user.json"))
            .with_project(dir.path().join("project.json"))
    }

    #[test]
    fn layers_merge_in_precedence_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("system.json"),
            r##"{"colors": {"background": "#333", "font": "mono"}, "python": {"run": "sys"}}"##,
        )
        .unwrap();
        fs::write(
            dir.path().join("user.json"),
            r##"{"colors": {"background": "#222", "user_specific": "abc"}}"##,
        )
        .unwrap();
        fs::write(
            dir.path().join("project.json"),
            r##"{"colors": {"background": "#111"}, "python": {"run": "proj"}}"##,
        )
        .unwrap();

        let store = ConfigStore::load(paths(&dir));
        let cfg = store.snapshot();
        assert_eq!(cfg.get_str("colors.background"), Some("#111"));
        assert_eq!(cfg.get_str("colors.font"), Some("mono"));
        assert_eq!(cfg.get_str("colors.user_specific"), Some("abc"));
        assert_eq!(cfg.get_str("python.run"), Some("proj"));
        // defaults survive underneath
        assert!(cfg.get("file_associations").is_some());
    }

    #[test]
    fn missing_project_file_equals_merge_of_remaining() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("user.json"), r#"{"a": 1}"#).unwrap();

        let with_missing = ConfigStore::load(paths(&dir)).snapshot();
        let without = ConfigStore::load(
            ConfigPaths::default().with_user(dir.path().join("user.json")),
        )
        .snapshot();
        assert_eq!(with_missing.tree(), without.tree());
    }

    #[test]
    fn malformed_source_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("user.json"), "{ oops").unwrap();
        fs::write(dir.path().join("project.json"), r#"{"k": "v"}"#).unwrap();

        let cfg = ConfigStore::load(paths(&dir)).snapshot();
        assert_eq!(cfg.get_str("k"), Some("v"));
    }

    #[test]
    fn reload_publishes_new_snapshot_without_touching_old() {
        let dir = TempDir::new().unwrap();
        let project = dir.path().join("project.json");
        fs::write(&project, r#"{"k": "old"}"#).unwrap();

        let store = ConfigStore::load(paths(&dir));
        let mut rx = store.subscribe();
        let before = store.snapshot();

        fs::write(&project, r#"{"k": "new"}"#).unwrap();
        let after = store.reload();

        assert_eq!(before.get_str("k"), Some("old"));
        assert_eq!(after.get_str("k"), Some("new"));
        assert_eq!(store.snapshot().get_str("k"), Some("new"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().get_str("k"), Some("new"));
    }

    #[test]
    fn watch_skips_missing_directories() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ConfigStore::load(
            ConfigPaths::default()
                .with_user(dir.path().join("absent/dir/config.json"))
                .with_project(dir.path().join("project.json")),
        ));
        assert!(store.watch().is_ok());
    }
}
