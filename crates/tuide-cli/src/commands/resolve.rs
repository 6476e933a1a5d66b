use anyhow::{Context, Result};
use std::path::Path;
use std::process::ExitCode;
use tuide_config::Resolver;

use super::Env;

pub fn resolve(env: &Env, template: &str, file: Option<&Path>) -> Result<ExitCode> {
    let config = env.store.snapshot();
    let context = env.context(file);
    let resolved = Resolver::new(&context, &config)
        .resolve(template)
        .with_context(|| format!("Failed to resolve '{}'", template))?;
    println!("{}", resolved);
    Ok(ExitCode::SUCCESS)
}
