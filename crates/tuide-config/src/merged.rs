//! The merged configuration and typed views over it.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::source::{ConfigTree, empty_tree};

/// The single tree produced by folding every source. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedConfig {
    tree: ConfigTree,
    origins: Vec<String>,
}

impl Default for MergedConfig {
    fn default() -> Self {
        Self::new(empty_tree(), Vec::new())
    }
}

/// An LSP server entry under `lsp_servers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LspServerConfig {
    pub command: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A named file template under `templates.<language>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTemplate {
    /// Filename glob selecting files this template applies to.
    pub trigger: String,
    /// Template body, eligible for placeholder resolution.
    pub content: String,
}

/// Settings under `runner`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default = "default_true")]
    pub shell: bool,
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl RunnerSettings {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            shell: true,
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_grace_period_ms() -> u64 {
    3000
}

impl MergedConfig {
    pub fn new(tree: ConfigTree, origins: Vec<String>) -> Self {
        Self { tree, origins }
    }

    pub fn tree(&self) -> &ConfigTree {
        &self.tree
    }

    /// Origins of the merged sources, lowest precedence first.
    pub fn origins(&self) -> &[String] {
        &self.origins
    }

    /// Walk a dot-separated key path through mappings.
    ///
    /// Returns `None` for a missing key, an empty segment, or a non-mapping
    /// met before the path is exhausted.
    pub fn get(&self, path: &str) -> Option<&ConfigTree> {
        path.split('.').try_fold(&self.tree, |node, segment| {
            if segment.is_empty() {
                return None;
            }
            match node {
                Value::Object(map) => map.get(segment),
                Value::Null
                | Value::Bool(_)
                | Value::Number(_)
                | Value::String(_)
                | Value::Array(_) => None,
            }
        })
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(Value::as_str)
    }

    /// Deserialize the value at `path`. `Ok(None)` when the key is absent or null.
    pub fn get_as<T: DeserializeOwned>(&self, path: &str) -> ConfigResult<Option<T>> {
        match self.get(path) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| ConfigError::InvalidValue {
                    field: path.to_string(),
                    message: e.to_string(),
                }),
        }
    }

    fn string_map(&self, path: &str) -> BTreeMap<String, String> {
        self.get(path)
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Color roles to color values.
    pub fn theme(&self) -> BTreeMap<String, String> {
        self.string_map("theme")
    }

    /// File extension (without dot) to language identifier.
    pub fn file_associations(&self) -> BTreeMap<String, String> {
        self.string_map("file_associations")
    }

    pub fn language_for_extension(&self, extension: &str) -> Option<&str> {
        let extension = extension.trim_start_matches('.');
        self.get("file_associations")
            .and_then(Value::as_object)
            .and_then(|map| map.get(extension))
            .and_then(Value::as_str)
    }

    pub fn language_for_path(&self, path: &Path) -> Option<&str> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| self.language_for_extension(ext))
    }

    pub fn lsp_servers(&self) -> ConfigResult<BTreeMap<String, LspServerConfig>> {
        Ok(self.get_as("lsp_servers")?.unwrap_or_default())
    }

    /// The LSP server for a language, if one is configured and enabled.
    pub fn lsp_server(&self, language: &str) -> ConfigResult<Option<LspServerConfig>> {
        let server: Option<LspServerConfig> = self
            .get("lsp_servers")
            .and_then(Value::as_object)
            .and_then(|servers| servers.get(language))
            .filter(|v| !v.is_null())
            .map(|v| {
                LspServerConfig::deserialize(v).map_err(|e| ConfigError::InvalidValue {
                    field: format!("lsp_servers.{}", language),
                    message: e.to_string(),
                })
            })
            .transpose()?;
        Ok(server.filter(|s| s.enabled))
    }

    pub fn editor_settings(&self) -> Map<String, Value> {
        self.get("editor_settings")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn runner_settings(&self) -> ConfigResult<RunnerSettings> {
        Ok(self.get_as("runner")?.unwrap_or_default())
    }

    /// Command template for a language action such as `run`, `debug` or `test`.
    pub fn command_template(&self, language: &str, action: &str) -> Option<&str> {
        self.get(language)
            .and_then(Value::as_object)
            .and_then(|commands| commands.get(action))
            .and_then(Value::as_str)
    }

    pub fn macros(&self) -> BTreeMap<String, String> {
        self.string_map("macros")
    }

    pub fn macro_template(&self, name: &str) -> Option<&str> {
        self.get("macros")
            .and_then(Value::as_object)
            .and_then(|macros| macros.get(name))
            .and_then(Value::as_str)
    }

    /// Named file templates for a language, in file order.
    pub fn templates(&self, language: &str) -> ConfigResult<Vec<(String, FileTemplate)>> {
        let Some(entries) = self
            .get("templates")
            .and_then(Value::as_object)
            .and_then(|t| t.get(language))
            .and_then(Value::as_object)
        else {
            return Ok(Vec::new());
        };

        entries
            .iter()
            .map(|(name, value)| {
                FileTemplate::deserialize(value)
                    .map(|template| (name.clone(), template))
                    .map_err(|e| ConfigError::InvalidValue {
                        field: format!("templates.{}.{}", language, name),
                        message: e.to_string(),
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(tree: ConfigTree) -> MergedConfig {
        MergedConfig::new(tree, vec!["test".to_string()])
    }

    #[test]
    fn get_walks_mappings_only() {
        let cfg = config(json!({"a": {"b": {"c": "deep"}}, "list": [1, 2], "s": "x"}));
        assert_eq!(cfg.get_str("a.b.c"), Some("deep"));
        assert!(cfg.get("a.b").unwrap().is_object());
        assert!(cfg.get("a.missing").is_none());
        assert!(cfg.get("list.0").is_none());
        assert!(cfg.get("s.x").is_none());
        assert!(cfg.get("a..b").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn get_as_deserializes_and_reports_bad_shapes() {
        let cfg = config(json!({"runner": {"shell": false}, "bad": {"shell": "yes"}}));
        let settings: RunnerSettings = cfg.get_as("runner").unwrap().unwrap();
        assert!(!settings.shell);
        assert_eq!(settings.grace_period(), Duration::from_millis(3000));

        let err = cfg.get_as::<RunnerSettings>("bad").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "bad"));
        assert!(cfg.get_as::<RunnerSettings>("absent").unwrap().is_none());
    }

    #[test]
    fn language_lookup_by_extension() {
        let cfg = config(json!({"file_associations": {"py": "python", "rs": "rust"}}));
        assert_eq!(cfg.language_for_extension("py"), Some("python"));
        assert_eq!(cfg.language_for_extension(".rs"), Some("rust"));
        assert_eq!(cfg.language_for_path(Path::new("/x/y/main.rs")), Some("rust"));
        assert_eq!(cfg.language_for_path(Path::new("Makefile")), None);
    }

    #[test]
    fn lsp_server_respects_enabled_flag() {
        let cfg = config(json!({
            "lsp_servers": {
                "python": {"command": ["pylsp"], "enabled": true},
                "go": {"command": ["gopls"], "enabled": false},
                "broken": {"enabled": true}
            }
        }));
        assert_eq!(cfg.lsp_server("python").unwrap().unwrap().command, vec!["pylsp"]);
        assert!(cfg.lsp_server("go").unwrap().is_none());
        assert!(cfg.lsp_server("zig").unwrap().is_none());
        assert!(cfg.lsp_server("broken").is_err());
    }

    #[test]
    fn command_and_macro_templates() {
        let cfg = config(json!({
            "python": {"run": "python3 %current_file_path%"},
            "macros": {"sort_imports": "isort %current_file_path%"}
        }));
        assert_eq!(cfg.command_template("python", "run"), Some("python3 %current_file_path%"));
        assert_eq!(cfg.command_template("python", "debug"), None);
        assert_eq!(cfg.macro_template("sort_imports"), Some("isort %current_file_path%"));
        assert_eq!(cfg.macros().len(), 1);
    }

    #[test]
    fn templates_keep_file_order() {
        let cfg = config(json!({
            "templates": {
                "python": {
                    "test": {"trigger": "test_*.py", "content": "import pytest\n"},
                    "script": {"trigger": "*.py", "content": "print()\n"}
                }
            }
        }));
        let templates = cfg.templates("python").unwrap();
        let names: Vec<_> = templates.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["test", "script"]);
        assert!(cfg.templates("rust").unwrap().is_empty());
    }

    #[test]
    fn theme_and_editor_settings() {
        let cfg = config(json!({
            "theme": {"background": "#000", "bogus": 1},
            "editor_settings": {"tab_size": 2}
        }));
        assert_eq!(cfg.theme().get("background").map(String::as_str), Some("#000"));
        assert!(!cfg.theme().contains_key("bogus"));
        assert_eq!(cfg.editor_settings()["tab_size"], 2);
    }
}
