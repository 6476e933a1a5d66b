//! `tuide config` subcommands.

use anyhow::{Context, Result};
use std::process::ExitCode;
use tuide_config::Resolver;
use tuide_core::ExecutionContext;

use super::Env;

/// Print the merged config, or the value under one dotted key.
///
/// With a context, string values are printed with placeholders resolved.
pub fn show(env: &Env, key: Option<&str>, context: Option<&ExecutionContext>) -> Result<ExitCode> {
    let config = env.store.snapshot();
    let value = match key {
        Some(key) => match config.get(key) {
            Some(value) => value,
            None => {
                eprintln!("No config value at '{}'", key);
                return Ok(ExitCode::FAILURE);
            }
        },
        None => config.tree(),
    };

    let rendered = match context {
        Some(context) => {
            let resolved = Resolver::new(context, &config)
                .resolve_tree(value)
                .context("Failed to resolve config values")?;
            serde_json::to_string_pretty(&resolved)
        }
        None => serde_json::to_string_pretty(value),
    }
    .context("Failed to render config")?;
    println!("{}", rendered);
    Ok(ExitCode::SUCCESS)
}

/// List each source file in precedence order and whether it exists.
pub fn paths(env: &Env) -> Result<ExitCode> {
    println!("{:<10} (built-in)", "defaults");
    for (precedence, path) in env.store.paths().tiers() {
        let state = if path.is_file() { "found" } else { "missing" };
        println!("{:<10} {} [{}]", precedence.to_string(), path.display(), state);
    }
    Ok(ExitCode::SUCCESS)
}

/// Print the merged config on every reload until Ctrl-C.
pub async fn watch(env: Env) -> Result<ExitCode> {
    let _watcher = env
        .store
        .watch()
        .context("Failed to watch config sources")?;
    let mut updates = env.store.subscribe();

    show(&env, None, None)?;
    eprintln!("Watching config sources, press Ctrl-C to stop");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                let rendered = serde_json::to_string_pretty(snapshot.tree())
                    .context("Failed to render config")?;
                println!("{}", rendered);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    Ok(ExitCode::SUCCESS)
}
