//! Gated operations: `exec`, `write`, `edit`, `delete`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use hybot_config::Config;
use hybot_guard::{ExecutionOutcome, Operation};
use tracing::debug;

use crate::session::{GateSession, RunOptions, ensure_trusted};
use crate::theme::Theme;

/// Exit status for a denied operation.
const DENIED_EXIT: u8 = 3;

/// Where the content of a `write` comes from.
#[derive(Debug, Clone)]
pub(crate) enum WriteSource {
    /// Literal text from `--content`.
    Inline(String),
    /// A local file read by the CLI itself.
    File(PathBuf),
}

impl WriteSource {
    fn read(self) -> Result<String> {
        match self {
            Self::Inline(content) => Ok(content),
            Self::File(path) => std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display())),
        }
    }
}

/// `hybot exec <cmd>`
pub(crate) async fn run_exec(config: &Config, options: &RunOptions, command: &str) -> Result<ExitCode> {
    run_operation(config, options, Operation::shell(command)).await
}

/// `hybot write <path>`
pub(crate) async fn run_write(
    config: &Config,
    options: &RunOptions,
    path: &Path,
    source: WriteSource,
) -> Result<ExitCode> {
    let content = source.read()?;
    run_operation(config, options, Operation::write(path, content)).await
}

/// `hybot edit <path> --old S --new S`
pub(crate) async fn run_edit(
    config: &Config,
    options: &RunOptions,
    path: &Path,
    old_text: &str,
    new_text: &str,
    replace_all: bool,
) -> Result<ExitCode> {
    let op = Operation::edit(path, old_text, new_text, replace_all);
    run_operation(config, options, op).await
}

/// `hybot delete <path>`
pub(crate) async fn run_delete(config: &Config, options: &RunOptions, path: &Path) -> Result<ExitCode> {
    run_operation(config, options, Operation::delete(path)).await
}

async fn run_operation(config: &Config, options: &RunOptions, op: Operation) -> Result<ExitCode> {
    ensure_trusted(options)?;
    let session = GateSession::start(config, options)?;

    debug!(operation = %op.summary(), "submitting operation");
    let outcome = session.executor().execute(&op).await?;
    print_outcome(&outcome);
    Ok(exit_code(&outcome))
}

/// Print an outcome: results on stdout, denials and failures on stderr.
pub(crate) fn print_outcome(outcome: &ExecutionOutcome) {
    match outcome {
        ExecutionOutcome::Executed { .. } => println!("{}", Theme::outcome(outcome)),
        ExecutionOutcome::Denied { .. } | ExecutionOutcome::Failed { .. } => {
            eprintln!("{}", Theme::outcome(outcome));
        },
    }
}

/// Process exit status for an outcome.
pub(crate) fn exit_code(outcome: &ExecutionOutcome) -> ExitCode {
    ExitCode::from(exit_status(outcome))
}

fn exit_status(outcome: &ExecutionOutcome) -> u8 {
    match outcome {
        ExecutionOutcome::Executed { exit_code, .. } => {
            if *exit_code == 0 {
                0
            } else {
                u8::try_from(*exit_code).unwrap_or(1).max(1)
            }
        },
        ExecutionOutcome::Denied { .. } => DENIED_EXIT,
        ExecutionOutcome::Failed { .. } => 1,
    }
}
