//! Layered JSON configuration for tuide.
//!
//! This crate handles:
//! - Loading config sources (defaults, system, user, project)
//! - Deep-merging them by precedence into one `MergedConfig`
//! - Placeholder resolution for command and file templates
//! - Holding and reloading config snapshots

pub mod defaults;
pub mod error;
pub mod merge;
pub mod merged;
pub mod placeholder;
pub mod source;
pub mod store;
pub mod template;

pub use error::{ConfigError, ConfigResult, ResolveError, ResolveResult};
pub use merge::{deep_merge, merge};
pub use merged::{FileTemplate, LspServerConfig, MergedConfig, RunnerSettings};
pub use placeholder::{Resolver, Token, resolve};
pub use source::{ConfigPaths, ConfigSource, ConfigTree, Precedence};
pub use store::{ConfigStore, ConfigWatcher};
pub use template::{CreatedFile, TemplateMatch, create_from_template, find_template};
