//! User-triggered actions and the command template each one selects.

use std::fmt;
use std::path::Path;
use tuide_config::MergedConfig;
use tuide_core::ExecutionContext;

use crate::error::{ActionError, ActionResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// The language's `run` command.
    Run,
    /// The language's `debug` command.
    Debug,
    /// The language's `test` command.
    Test,
    /// A named template under `macros`.
    Macro(String),
    /// An ad-hoc template.
    Raw(String),
}

impl Action {
    /// Key of the per-language command, for language actions.
    pub fn command_key(&self) -> Option<&'static str> {
        match self {
            Action::Run => Some("run"),
            Action::Debug => Some("debug"),
            Action::Test => Some("test"),
            Action::Macro(_) | Action::Raw(_) => None,
        }
    }

    /// Select the unresolved template for this action.
    ///
    /// Language actions use `language` when given, else the language
    /// associated with the context's current file.
    pub fn template(
        &self,
        config: &MergedConfig,
        context: &ExecutionContext,
        language: Option<&str>,
    ) -> ActionResult<String> {
        match self {
            Action::Raw(template) => Ok(template.clone()),
            Action::Macro(name) => config
                .macro_template(name)
                .map(str::to_string)
                .ok_or_else(|| ActionError::UnknownMacro(name.clone())),
            Action::Run | Action::Debug | Action::Test => {
                let key = self.command_key().unwrap_or("run");
                let language = match language {
                    Some(language) => language,
                    None => language_of(config, context)?,
                };
                config
                    .command_template(language, key)
                    .map(str::to_string)
                    .ok_or_else(|| ActionError::MissingCommand {
                        language: language.to_string(),
                        action: key.to_string(),
                    })
            }
        }
    }
}

fn language_of<'a>(config: &'a MergedConfig, context: &ExecutionContext) -> ActionResult<&'a str> {
    if !context.has_file() {
        return Err(ActionError::NoActiveFile);
    }
    let path = Path::new(&context.current_file_path);
    config
        .language_for_path(path)
        .ok_or_else(|| ActionError::UnknownLanguage(context.current_file_name.clone()))
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Run => write!(f, "run"),
            Action::Debug => write!(f, "debug"),
            Action::Test => write!(f, "test"),
            Action::Macro(name) => write!(f, "macro {}", name),
            Action::Raw(_) => write!(f, "exec"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> MergedConfig {
        MergedConfig::new(
            json!({
                "file_associations": {"py": "python"},
                "python": {"run": "python3 %current_file_path%", "test": "pytest"},
                "macros": {"fmt": "black %current_file_path%"}
            }),
            Vec::new(),
        )
    }

    fn py_context() -> ExecutionContext {
        ExecutionContext::for_file("src/app.py", "/ws")
    }

    #[test]
    fn language_actions_use_file_extension() {
        let cfg = config();
        assert_eq!(
            Action::Run.template(&cfg, &py_context(), None).unwrap(),
            "python3 %current_file_path%"
        );
        assert_eq!(Action::Test.template(&cfg, &py_context(), None).unwrap(), "pytest");
    }

    #[test]
    fn language_override_wins() {
        let cfg = config();
        let ctx = ExecutionContext::for_workspace("/ws");
        assert_eq!(Action::Test.template(&cfg, &ctx, Some("python")).unwrap(), "pytest");
    }

    #[test]
    fn missing_pieces_are_reported() {
        let cfg = config();
        assert!(matches!(
            Action::Debug.template(&cfg, &py_context(), None),
            Err(ActionError::MissingCommand { ref language, ref action })
                if language == "python" && action == "debug"
        ));
        assert!(matches!(
            Action::Run.template(&cfg, &ExecutionContext::for_workspace("/ws"), None),
            Err(ActionError::NoActiveFile)
        ));
        assert!(matches!(
            Action::Run.template(&cfg, &ExecutionContext::for_file("x.zig", "/ws"), None),
            Err(ActionError::UnknownLanguage(ref f)) if f == "x.zig"
        ));
        assert!(matches!(
            Action::Macro("nope".into()).template(&cfg, &py_context(), None),
            Err(ActionError::UnknownMacro(_))
        ));
    }

    #[test]
    fn macros_and_raw_templates() {
        let cfg = config();
        let ctx = ExecutionContext::for_workspace("/ws");
        assert_eq!(
            Action::Macro("fmt".into()).template(&cfg, &ctx, None).unwrap(),
            "black %current_file_path%"
        );
        assert_eq!(Action::Raw("ls".into()).template(&cfg, &ctx, None).unwrap(), "ls");
        assert_eq!(Action::Macro("fmt".into()).to_string(), "macro fmt");
    }
}
