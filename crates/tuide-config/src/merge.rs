//! Config merging.
//!
//! Merge semantics:
//! - Mappings: deep-merge by key (recursive)
//! - Sequences: replaced entirely by the higher-precedence value
//! - Scalars: replaced by the higher-precedence value
//! - Null: replaces like any scalar, so it masks lower tiers

use serde_json::Value;
use tracing::debug;

use crate::merged::MergedConfig;
use crate::source::{ConfigSource, ConfigTree, empty_tree};

/// Deep merge `overlay` on top of `base`.
pub fn deep_merge(base: ConfigTree, overlay: ConfigTree) -> ConfigTree {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        // Scalars, sequences, null, and mapping-vs-other: overlay wins
        (_, overlay) => overlay,
    }
}

/// Fold trees in the given order, first lowest.
pub fn merge_trees(trees: impl IntoIterator<Item = ConfigTree>) -> ConfigTree {
    trees.into_iter().fold(empty_tree(), deep_merge)
}

/// Merge sources in ascending precedence order.
pub fn merge(sources: impl IntoIterator<Item = ConfigSource>) -> MergedConfig {
    let mut sources: Vec<ConfigSource> = sources.into_iter().collect();
    sources.sort_by_key(|s| s.precedence);

    let origins = sources.iter().map(|s| s.origin.clone()).collect();
    let tree = merge_trees(sources.into_iter().map(|source| {
        debug!(origin = %source.origin, precedence = %source.precedence, "Merging config source");
        source.tree
    }));

    MergedConfig::new(tree, origins)
}
