//! Placeholder resolution for command and file templates.
//!
//! Supports tokens like:
//! - `%current_file_name%` - file name of the active file
//! - `%current_file_path%` - absolute path of the active file
//! - `%current_dir%` - directory of the active file
//! - `%workspace_root%` - workspace root
//! - `%config:python.run%` - a value from the merged configuration
//!
//! A token is the shortest `%...%` span on one line whose body is either an
//! identifier (`[A-Za-z_][A-Za-z0-9_]*`) or `config:` followed by a key path.
//! Any other `%` is left verbatim, so shell usages such as `date +%Y-%m-%d`
//! or `100%` pass through untouched. Identifier-shaped tokens that are not
//! context identifiers are errors.
//!
//! Config references are expanded recursively. Expansion stops with a
//! `Cycle` error when a reference is already being resolved or when the
//! chain grows deeper than `MAX_EXPANSION_DEPTH`. Context values are
//! inserted verbatim and never rescanned, so a file path that itself looks
//! like a token (`/tmp/%bogus%.py`) survives in the result. Everything else
//! in a successful result is token-free.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tuide_core::ExecutionContext;

use crate::error::{ResolveError, ResolveResult};
use crate::merged::MergedConfig;
use crate::source::ConfigTree;

/// Maximum number of nested config references followed in one resolution.
pub const MAX_EXPANSION_DEPTH: usize = 10;

static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"%(?:config:(?P<path>[^%\s]*)|(?P<ident>[A-Za-z_][A-Za-z0-9_]*))%").unwrap()
});

/// A token found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A fixed identifier such as `current_dir`.
    Identifier(String),
    /// A `config:` key path.
    ConfigRef(String),
}

/// List the tokens in a template, in order of appearance.
pub fn tokens(template: &str) -> Vec<Token> {
    TOKEN_REGEX
        .captures_iter(template)
        .filter_map(|caps| {
            if let Some(path) = caps.name("path") {
                Some(Token::ConfigRef(path.as_str().to_string()))
            } else {
                caps.name("ident")
                    .map(|ident| Token::Identifier(ident.as_str().to_string()))
            }
        })
        .collect()
}

/// Whether the template names a given identifier token.
pub fn mentions(template: &str, identifier: &str) -> bool {
    tokens(template)
        .iter()
        .any(|t| matches!(t, Token::Identifier(ident) if ident == identifier))
}

/// Resolve a template against a context and a config snapshot.
pub fn resolve(
    template: &str,
    context: &ExecutionContext,
    config: &MergedConfig,
) -> ResolveResult<String> {
    Resolver::new(context, config).resolve(template)
}

/// Expands placeholder tokens. Pure: performs no I/O.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    context: &'a ExecutionContext,
    config: &'a MergedConfig,
    max_depth: usize,
}

impl<'a> Resolver<'a> {
    pub fn new(context: &'a ExecutionContext, config: &'a MergedConfig) -> Self {
        Self {
            context,
            config,
            max_depth: MAX_EXPANSION_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Expand every token in `template`.
    pub fn resolve(&self, template: &str) -> ResolveResult<String> {
        let mut in_progress = Vec::new();
        self.expand(template, &mut in_progress)
    }

    /// Resolve the config value at `path` as if it were `%config:<path>%`.
    pub fn resolve_key(&self, path: &str) -> ResolveResult<String> {
        let mut in_progress = Vec::new();
        self.expand_reference(path, &mut in_progress)
    }

    /// Resolve every string leaf of a tree, keeping its shape.
    pub fn resolve_tree(&self, tree: &ConfigTree) -> ResolveResult<ConfigTree> {
        match tree {
            Value::String(s) => Ok(Value::String(self.resolve(s)?)),
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_tree(item))
                .collect::<ResolveResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| Ok((k.clone(), self.resolve_tree(v)?)))
                .collect::<ResolveResult<serde_json::Map<_, _>>>()
                .map(Value::Object),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(tree.clone()),
        }
    }

    fn expand(&self, template: &str, in_progress: &mut Vec<String>) -> ResolveResult<String> {
        let mut output = String::with_capacity(template.len());
        let mut last = 0;

        for caps in TOKEN_REGEX.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            output.push_str(&template[last..whole.start()]);

            if let Some(path) = caps.name("path") {
                output.push_str(&self.expand_reference(path.as_str(), in_progress)?);
            } else if let Some(ident) = caps.name("ident") {
                let value = self
                    .context
                    .lookup(ident.as_str())
                    .ok_or_else(|| ResolveError::UnresolvedToken(ident.as_str().to_string()))?;
                output.push_str(value);
            }

            last = whole.end();
        }

        output.push_str(&template[last..]);
        Ok(output)
    }

    fn expand_reference(&self, path: &str, in_progress: &mut Vec<String>) -> ResolveResult<String> {
        let cycle = |in_progress: &[String]| {
            let mut chain = in_progress.to_vec();
            chain.push(path.to_string());
            ResolveError::Cycle {
                path: path.to_string(),
                chain,
            }
        };

        if in_progress.iter().any(|p| p == path) || in_progress.len() >= self.max_depth {
            return Err(cycle(in_progress.as_slice()));
        }

        let value = self
            .config
            .get(path)
            .ok_or_else(|| ResolveError::UnresolvedReference {
                path: path.to_string(),
            })?;

        let raw = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => return Ok(n.to_string()),
            Value::Bool(b) => return Ok(b.to_string()),
            Value::Null => return Ok(String::new()),
            Value::Array(_) | Value::Object(_) => {
                return Err(ResolveError::NotScalar {
                    path: path.to_string(),
                });
            }
        };

        in_progress.push(path.to_string());
        let expanded = self.expand(&raw, in_progress);
        in_progress.pop();
        expanded
    }
}
