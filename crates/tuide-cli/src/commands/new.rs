use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tuide_config::create_from_template;

use super::Env;

/// Create a file from the template matching its name.
pub fn create(env: &Env, file: &Path, force: bool) -> Result<ExitCode> {
    let config = env.store.snapshot();
    let created = create_from_template(&config, &env.workspace_root, file, force)
        .with_context(|| format!("Failed to create {}", file.display()))?;

    match created.template {
        Some(name) => println!("Created {} from template '{}'", created.path.display(), name),
        None => println!("Created {} (no matching template)", created.path.display()),
    }
    Ok(ExitCode::SUCCESS)
}
