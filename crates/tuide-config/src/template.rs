//! File templates.
//!
//! A new file picks up the first template of its language whose `trigger`
//! glob matches the file name. The template body goes through the same
//! placeholder resolution as command templates.

use globset::Glob;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tuide_core::ExecutionContext;

use crate::error::{ConfigError, ConfigResult};
use crate::merged::{FileTemplate, MergedConfig};
use crate::placeholder::Resolver;

/// A template selected for a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateMatch {
    pub language: String,
    pub name: String,
    pub template: FileTemplate,
}

/// Find the template for `path`, if its language has one whose trigger
/// matches the file name.
pub fn find_template(config: &MergedConfig, path: &Path) -> ConfigResult<Option<TemplateMatch>> {
    let Some(language) = config.language_for_path(path) else {
        return Ok(None);
    };
    let Some(file_name) = path.file_name() else {
        return Ok(None);
    };

    for (name, template) in config.templates(language)? {
        let matcher = Glob::new(&template.trigger)
            .map_err(|source| ConfigError::InvalidTrigger {
                pattern: template.trigger.clone(),
                source,
            })?
            .compile_matcher();

        if matcher.is_match(file_name) {
            debug!(language, template = %name, "Template matched");
            return Ok(Some(TemplateMatch {
                language: language.to_string(),
                name,
                template,
            }));
        }
    }

    Ok(None)
}

/// Resolve the template body against a file's context.
pub fn render(
    template: &FileTemplate,
    context: &ExecutionContext,
    config: &MergedConfig,
) -> ConfigResult<String> {
    Ok(Resolver::new(context, config).resolve(&template.content)?)
}

/// Result of writing a file from its template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFile {
    pub path: PathBuf,
    /// `None` when no template matched and an empty file was written.
    pub template: Option<String>,
}

/// Create `file` (relative paths join `workspace_root`) from its matching
/// template. An existing file is left alone unless `force` is set.
pub fn create_from_template(
    config: &MergedConfig,
    workspace_root: &Path,
    file: &Path,
    force: bool,
) -> ConfigResult<CreatedFile> {
    let context = ExecutionContext::for_file(file, workspace_root);
    let path = PathBuf::from(&context.current_file_path);

    let found = find_template(config, &path)?;
    let content = match &found {
        Some(m) => render(&m.template, &context, config)?,
        None => String::new(),
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    let mut handle = options.open(&path)?;
    handle.write_all(content.as_bytes())?;

    info!(
        path = %path.display(),
        template = found.as_ref().map(|m| m.name.as_str()).unwrap_or("none"),
        "Created file"
    );

    Ok(CreatedFile {
        path,
        template: found.map(|m| m.name),
    })
}
