//! Config source loading.
//!
//! A missing source file is not an error and loads as an empty mapping. A
//! malformed one is reported through a warning and also loads as an empty
//! mapping, so one broken file never stops startup.

use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::defaults;
use crate::error::{ConfigError, ConfigResult};

/// A parsed JSON document, or the result of merging several.
pub type ConfigTree = Value;

/// File name shared by every on-disk tier.
pub const CONFIG_FILE_NAME: &str = "config.json";
/// Directory name under the workspace root holding the project tier.
pub const PROJECT_CONFIG_DIR: &str = ".tuide";

/// Precedence rank of a source. Later variants win.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Precedence {
    Defaults,
    System,
    User,
    Project,
}

impl Precedence {
    pub const ALL: [Precedence; 4] = [
        Precedence::Defaults,
        Precedence::System,
        Precedence::User,
        Precedence::Project,
    ];
}

impl fmt::Display for Precedence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Precedence::Defaults => "defaults",
            Precedence::System => "system",
            Precedence::User => "user",
            Precedence::Project => "project",
        };
        f.write_str(name)
    }
}

/// A config tree tagged with its rank and origin.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigSource {
    pub precedence: Precedence,
    /// Where the tree came from, for diagnostics.
    pub origin: String,
    pub tree: ConfigTree,
}

impl ConfigSource {
    pub fn new(precedence: Precedence, origin: impl Into<String>, tree: ConfigTree) -> Self {
        Self {
            precedence,
            origin: origin.into(),
            tree,
        }
    }

    /// The built-in defaults tier.
    pub fn defaults() -> Self {
        Self::new(Precedence::Defaults, "built-in defaults", defaults::tree())
    }

    /// Load a tier from disk, softly.
    pub fn load(precedence: Precedence, path: &Path) -> Self {
        Self::new(precedence, path.display().to_string(), load_tree(path))
    }
}

pub fn empty_tree() -> ConfigTree {
    Value::Object(Map::new())
}

/// Read and parse a config file.
///
/// Returns `Ok(None)` when the file does not exist. A document whose root is
/// not a JSON object is rejected as a parse failure.
pub fn read_tree(path: &Path) -> ConfigResult<Option<ConfigTree>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let tree: ConfigTree =
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    if !tree.is_object() {
        return Err(ConfigError::InvalidValue {
            field: path.display().to_string(),
            message: "config root must be a JSON object".to_string(),
        });
    }

    Ok(Some(tree))
}

/// Load a config file, degrading every failure to an empty tree.
pub fn load_tree(path: &Path) -> ConfigTree {
    match read_tree(path) {
        Ok(Some(tree)) => {
            debug!(path = %path.display(), "Loaded config source");
            tree
        }
        Ok(None) => {
            debug!(path = %path.display(), "No config source found, skipping");
            empty_tree()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config source");
            empty_tree()
        }
    }
}

/// Locations of the three on-disk tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPaths {
    pub system: Option<PathBuf>,
    pub user: Option<PathBuf>,
    pub project: Option<PathBuf>,
}

impl ConfigPaths {
    /// Platform locations for a workspace:
    /// - system: `/etc/tuide/config.json` (unix only)
    /// - user: `<config_dir>/tuide/config.json`
    /// - project: `<workspace_root>/.tuide/config.json`
    pub fn discover(workspace_root: &Path) -> Self {
        let system = if cfg!(unix) {
            Some(PathBuf::from("/etc/tuide").join(CONFIG_FILE_NAME))
        } else {
            None
        };

        Self {
            system,
            user: dirs::config_dir().map(|d| d.join("tuide").join(CONFIG_FILE_NAME)),
            project: Some(workspace_root.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE_NAME)),
        }
    }

    pub fn with_system(mut self, path: impl Into<PathBuf>) -> Self {
        self.system = Some(path.into());
        self
    }

    pub fn with_user(mut self, path: impl Into<PathBuf>) -> Self {
        self.user = Some(path.into());
        self
    }

    pub fn with_project(mut self, path: impl Into<PathBuf>) -> Self {
        self.project = Some(path.into());
        self
    }

    /// The configured on-disk tiers, lowest precedence first.
    pub fn tiers(&self) -> Vec<(Precedence, &Path)> {
        [
            (Precedence::System, self.system.as_deref()),
            (Precedence::User, self.user.as_deref()),
            (Precedence::Project, self.project.as_deref()),
        ]
        .into_iter()
        .filter_map(|(precedence, path)| path.map(|p| (precedence, p)))
        .collect()
    }

    /// Load every tier, built-in defaults first.
    pub fn load_sources(&self) -> Vec<ConfigSource> {
        let mut sources = vec![ConfigSource::defaults()];
        for (precedence, path) in self.tiers() {
            sources.push(ConfigSource::load(precedence, path));
        }
        sources
    }
}
