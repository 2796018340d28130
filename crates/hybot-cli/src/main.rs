//! HyBot CLI - guarded execution from the terminal.
//!
//! Every shell command and file mutation goes through the gate: it is
//! classified, checked against the approval mode and, when needed, confirmed
//! at the terminal before anything runs.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use hybot_config::{Config, LoadOptions, ResolvedConfig};
use hybot_guard::ApprovalMode;
use tracing::debug;

mod approval_handler;
mod commands;
mod config_bridge;
mod session;
mod theme;

use commands::operate::WriteSource;
use commands::{classify, config, operate, shell, trust};
use session::RunOptions;
use theme::Theme;

/// HyBot - guarded execution gate for agent actions
#[derive(Parser)]
#[command(name = "hybot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the global configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Approval mode: always, dangerous or never
    #[arg(short, long, global = true)]
    mode: Option<ApprovalMode>,

    /// Never prompt; fall back to the mode's default decision
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Trust the workspace without asking
    #[arg(long, global = true)]
    trust: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a shell command through the gate
    Exec {
        /// The command line, passed to the shell as-is
        command: String,
    },

    /// Write a file through the gate
    Write {
        /// Target path
        path: PathBuf,

        #[command(flatten)]
        source: WriteArgs,
    },

    /// Replace exact text in a file through the gate
    Edit {
        /// Target path
        path: PathBuf,
        /// Text to replace
        #[arg(long)]
        old: String,
        /// Replacement text
        #[arg(long)]
        new: String,
        /// Replace every occurrence
        #[arg(long)]
        all: bool,
    },

    /// Delete a file or directory through the gate
    Delete {
        /// Target path
        path: PathBuf,
    },

    /// Classify a command without running it
    Classify {
        /// The command line to classify
        command: String,
        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive shell where every line goes through the gate
    Shell,

    /// Trust the workspace
    Trust {
        /// List trusted workspaces instead
        #[arg(long)]
        list: bool,
    },

    /// View configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct WriteArgs {
    /// Content to write
    #[arg(long)]
    content: Option<String>,
    /// Read the content from a local file
    #[arg(long)]
    from: Option<PathBuf>,
}

impl WriteArgs {
    fn into_source(self) -> Result<WriteSource> {
        match (self.content, self.from) {
            (Some(content), None) => Ok(WriteSource::Inline(content)),
            (None, Some(path)) => Ok(WriteSource::File(path)),
            _ => anyhow::bail!("exactly one of --content or --from is required"),
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved configuration and where it came from
    Show {
        /// Print as JSON instead of YAML
        #[arg(long)]
        json: bool,
    },
}

fn resolve_workspace(flag: Option<PathBuf>) -> Result<PathBuf> {
    let path = match flag {
        Some(path) => path,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    std::fs::canonicalize(&path)
        .with_context(|| format!("workspace {} does not exist", path.display()))
}

fn load_config(workspace: &Path, explicit: Option<&Path>) -> Result<ResolvedConfig> {
    let mut options = LoadOptions::for_workspace(workspace);
    if let Some(path) = explicit {
        options = options.with_config_file(path);
    }
    Config::load(&options).context("failed to load configuration")
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", Theme::error(&format!("{e:#}")));
            ExitCode::FAILURE
        },
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let workspace = resolve_workspace(cli.workspace)?;
    let resolved = load_config(&workspace, cli.config.as_deref())?;

    let log_config = config_bridge::to_log_config(&resolved.config, cli.verbose);
    let _log_guard = match hybot_telemetry::setup_logging(&log_config) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        },
    };
    debug!(files = ?resolved.loaded_files, "configuration loaded");

    let options = RunOptions {
        workspace,
        mode: cli.mode,
        non_interactive: cli.non_interactive,
        trust: cli.trust,
    };
    let cfg = &resolved.config;

    match cli.command {
        Commands::Exec { command } => operate::run_exec(cfg, &options, &command).await,
        Commands::Write { path, source } => {
            operate::run_write(cfg, &options, &path, source.into_source()?).await
        },
        Commands::Edit {
            path,
            old,
            new,
            all,
        } => operate::run_edit(cfg, &options, &path, &old, &new, all).await,
        Commands::Delete { path } => operate::run_delete(cfg, &options, &path).await,
        Commands::Classify { command, json } => {
            let mode = config_bridge::approval_mode(cfg, options.mode)?;
            classify::run_classify(&command, mode, json)
        },
        Commands::Shell => {
            shell::run_shell(cfg, &options).await?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Trust { list } => {
            trust::run_trust(&options.workspace, list)?;
            Ok(ExitCode::SUCCESS)
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show { json } => {
                config::show_config(&resolved, json)?;
                Ok(ExitCode::SUCCESS)
            },
        },
    }
}
