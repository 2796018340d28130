//! Execution primitives.
//!
//! The gate decides whether an operation is attempted; an
//! [`OperationRunner`] attempts it. [`SystemRunner`] runs shell commands
//! through `tokio::process` and mutates files with `tokio::fs`. Tests plug
//! in spy runners to observe that denied operations never reach this layer.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::operation::FileChange;

/// Default shell used for commands.
pub const DEFAULT_SHELL: &str = "bash";

/// Default command timeout (2 minutes).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(120);

/// Captured output of an attempted operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output, or a short confirmation for file operations.
    pub stdout: String,
    /// Standard error, or the reason an edit did not apply.
    pub stderr: String,
    /// Exit status. `-1` when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// A successful result with a message on stdout.
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            stdout: message.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    /// A completed-but-failed result with a message on stderr.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.into(),
            exit_code: 1,
        }
    }

    /// Whether the exit code is zero.
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors that prevent an operation from completing at all.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The shell could not be started.
    #[error("failed to spawn '{shell}': {source}")]
    Spawn {
        /// Shell program.
        shell: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish in time and was killed.
    #[error("command timed out after {0}s")]
    Timeout(u64),

    /// A filesystem call failed.
    #[error("{action} {path}: {source}")]
    Io {
        /// What was being done.
        action: &'static str,
        /// Affected path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl RunnerError {
    fn io(action: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Attempts operations the gate has let through.
#[async_trait]
pub trait OperationRunner: Send + Sync {
    /// Run `command` through the shell in `cwd`, killing it after `timeout`.
    async fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError>;

    /// Apply `change` to the file at `path` (absolute, already resolved).
    async fn write_file(&self, path: &Path, change: &FileChange)
    -> Result<CommandOutput, RunnerError>;

    /// Delete the file or directory tree at `path` (absolute, already resolved).
    async fn delete_path(&self, path: &Path) -> Result<CommandOutput, RunnerError>;
}

/// Runs operations against the real system.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    shell: String,
}

impl SystemRunner {
    /// Runner using the default shell.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shell(DEFAULT_SHELL)
    }

    /// Runner using `shell -c <command>`.
    #[must_use]
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }

    /// The configured shell.
    #[must_use]
    pub fn shell(&self) -> &str {
        &self.shell
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OperationRunner for SystemRunner {
    async fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        debug!(shell = %self.shell, cwd = %cwd.display(), "Running command");

        let child = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(RunnerError::Spawn {
                    shell: self.shell.clone(),
                    source,
                });
            },
            Err(_) => return Err(RunnerError::Timeout(timeout.as_secs())),
        };

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    async fn write_file(
        &self,
        path: &Path,
        change: &FileChange,
    ) -> Result<CommandOutput, RunnerError> {
        match change {
            FileChange::Content { content } => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| RunnerError::io("create directory", parent, e))?;
                }
                tokio::fs::write(path, content)
                    .await
                    .map_err(|e| RunnerError::io("write", path, e))?;
                Ok(CommandOutput::ok(format!(
                    "Wrote {} bytes to {}",
                    content.len(),
                    path.display()
                )))
            },
            FileChange::Edit {
                old_text,
                new_text,
                replace_all,
            } => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| RunnerError::io("read", path, e))?;

                let updated = match apply_edit(&content, old_text, new_text, *replace_all) {
                    Ok(updated) => updated,
                    Err(message) => {
                        return Ok(CommandOutput::failed(format!(
                            "{message} in {}",
                            path.display()
                        )));
                    },
                };

                tokio::fs::write(path, &updated.text)
                    .await
                    .map_err(|e| RunnerError::io("write", path, e))?;
                Ok(CommandOutput::ok(format!(
                    "Replaced {} occurrence(s) in {}",
                    updated.replacements,
                    path.display()
                )))
            },
        }
    }

    async fn delete_path(&self, path: &Path) -> Result<CommandOutput, RunnerError> {
        let metadata = tokio::fs::symlink_metadata(path)
            .await
            .map_err(|e| RunnerError::io("stat", path, e))?;

        if metadata.is_dir() {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| RunnerError::io("remove directory", path, e))?;
        } else {
            tokio::fs::remove_file(path)
                .await
                .map_err(|e| RunnerError::io("remove", path, e))?;
        }
        Ok(CommandOutput::ok(format!("Deleted {}", path.display())))
    }
}

struct EditResult {
    text: String,
    replacements: usize,
}

/// Replace `old` with `new` in `content`. Without `replace_all`, `old` must
/// occur exactly once.
fn apply_edit(content: &str, old: &str, new: &str, replace_all: bool) -> Result<EditResult, String> {
    if old.is_empty() {
        return Err("old text is empty".to_string());
    }
    let count = content.matches(old).count();
    match count {
        0 => Err("old text not found".to_string()),
        1 => Ok(EditResult {
            text: content.replacen(old, new, 1),
            replacements: 1,
        }),
        n if replace_all => Ok(EditResult {
            text: content.replace(old, new),
            replacements: n,
        }),
        n => Err(format!(
            "old text matches {n} times; provide more context or replace all occurrences"
        )),
    }
}
