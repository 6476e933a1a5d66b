//! tuide CLI tool.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::Env;

#[derive(Parser)]
#[command(name = "tuide")]
#[command(about = "Layered config and command templates for the tuide editor", long_about = None)]
struct Cli {
    /// Workspace root (defaults to the current directory)
    #[arg(long, global = true, env = "TUIDE_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Working directory for commands, overriding the template-based choice
    #[arg(long, global = true)]
    cwd: Option<PathBuf>,

    /// System-global config file
    #[arg(long, global = true, env = "TUIDE_SYSTEM_CONFIG")]
    system_config: Option<PathBuf>,

    /// User-global config file
    #[arg(long, global = true, env = "TUIDE_USER_CONFIG")]
    user_config: Option<PathBuf>,

    /// Project config file
    #[arg(long, global = true, env = "TUIDE_PROJECT_CONFIG")]
    project_config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the merged configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Print a template with all placeholders resolved
    Resolve {
        /// Template text, e.g. "python3 %current_file_path%"
        template: String,
        #[command(flatten)]
        target: Target,
    },
    /// Run the file with its language's run command
    Run(LanguageArgs),
    /// Debug the file with its language's debug command
    Debug(LanguageArgs),
    /// Run the language's test command
    Test(LanguageArgs),
    /// Run a named macro
    Macro {
        /// Macro name under `macros`
        name: String,
        #[command(flatten)]
        target: Target,
    },
    /// Resolve and run an ad-hoc template
    Exec {
        template: String,
        #[command(flatten)]
        target: Target,
    },
    /// Create a file from its matching template
    New {
        /// File to create, relative to the workspace root
        file: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the merged config, or one dotted key
    Show {
        /// Dotted key path, e.g. "python.run"
        key: Option<String>,
        /// Resolve placeholders in every string value
        #[arg(long)]
        resolved: bool,
        #[command(flatten)]
        target: Target,
    },
    /// List the config source files
    Paths,
    /// Print the merged config again whenever a source file changes
    Watch,
}

#[derive(Args)]
struct Target {
    /// Active file for the placeholder context, relative to the workspace root
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Args)]
struct LanguageArgs {
    #[command(flatten)]
    target: Target,
    /// Language to use instead of the file extension's
    #[arg(long)]
    language: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let env = Env::new(
        cli.workspace,
        cli.cwd,
        cli.system_config,
        cli.user_config,
        cli.project_config,
    )?;

    let code = match cli.command {
        Commands::Config { command } => match command {
            ConfigCommands::Show {
                key,
                resolved,
                target,
            } => {
                let context = resolved.then(|| env.context(target.file.as_deref()));
                commands::config::show(&env, key.as_deref(), context.as_ref())?
            }
            ConfigCommands::Paths => commands::config::paths(&env)?,
            ConfigCommands::Watch => commands::config::watch(env).await?,
        },
        Commands::Resolve { template, target } => {
            commands::resolve::resolve(&env, &template, target.file.as_deref())?
        }
        Commands::Run(args) => {
            commands::action::run(&env, tuide_session::Action::Run, args.target.file, args.language)
                .await?
        }
        Commands::Debug(args) => {
            commands::action::run(&env, tuide_session::Action::Debug, args.target.file, args.language)
                .await?
        }
        Commands::Test(args) => {
            commands::action::run(&env, tuide_session::Action::Test, args.target.file, args.language)
                .await?
        }
        Commands::Macro { name, target } => {
            commands::action::run(&env, tuide_session::Action::Macro(name), target.file, None)
                .await?
        }
        Commands::Exec { template, target } => {
            commands::action::run(&env, tuide_session::Action::Raw(template), target.file, None)
                .await?
        }
        Commands::New { file, force } => commands::new::create(&env, &file, force)?,
    };

    Ok(code)
}
