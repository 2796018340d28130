//! Operations proposed by the agent.
//!
//! An [`Operation`] is created per agent tool call and never mutated
//! afterwards. It carries just enough context for classification, for a
//! human to make an informed decision, and for the runner to perform it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Maximum number of characters of a shell command shown in summaries.
const SUMMARY_MAX_CHARS: usize = 200;

/// A shell command or file mutation proposed by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Operation {
    /// Run a command through the shell.
    ShellCommand {
        /// The command line exactly as the agent produced it.
        raw: String,
    },

    /// Create, overwrite or edit a file.
    FileWrite {
        /// Target path (absolute, or relative to the workspace root).
        path: PathBuf,
        /// What to write.
        change: FileChange,
    },

    /// Delete a file or directory.
    FileDelete {
        /// Target path (absolute, or relative to the workspace root).
        path: PathBuf,
    },
}

/// The content of a [`Operation::FileWrite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FileChange {
    /// Replace the whole file with `content`.
    Content {
        /// New file content.
        content: String,
    },
    /// Exact-text replacement inside an existing file.
    Edit {
        /// Text to find. Must be unique unless `replace_all` is set.
        old_text: String,
        /// Replacement text.
        new_text: String,
        /// Replace every occurrence instead of exactly one.
        replace_all: bool,
    },
}

/// Coarse kind of an operation, used as the rule class for safe operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// [`Operation::ShellCommand`].
    Shell,
    /// [`Operation::FileWrite`].
    FileWrite,
    /// [`Operation::FileDelete`].
    FileDelete,
}

impl OperationKind {
    /// Stable label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shell => "shell",
            Self::FileWrite => "file_write",
            Self::FileDelete => "file_delete",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Operation {
    /// Shell command operation.
    #[must_use]
    pub fn shell(raw: impl Into<String>) -> Self {
        Self::ShellCommand { raw: raw.into() }
    }

    /// Whole-file write operation.
    #[must_use]
    pub fn write(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self::FileWrite {
            path: path.into(),
            change: FileChange::Content {
                content: content.into(),
            },
        }
    }

    /// Exact-text edit operation.
    #[must_use]
    pub fn edit(
        path: impl Into<PathBuf>,
        old_text: impl Into<String>,
        new_text: impl Into<String>,
        replace_all: bool,
    ) -> Self {
        Self::FileWrite {
            path: path.into(),
            change: FileChange::Edit {
                old_text: old_text.into(),
                new_text: new_text.into(),
                replace_all,
            },
        }
    }

    /// Delete operation.
    #[must_use]
    pub fn delete(path: impl Into<PathBuf>) -> Self {
        Self::FileDelete { path: path.into() }
    }

    /// The kind of this operation.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::ShellCommand { .. } => OperationKind::Shell,
            Self::FileWrite { .. } => OperationKind::FileWrite,
            Self::FileDelete { .. } => OperationKind::FileDelete,
        }
    }

    /// Target path for file operations.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ShellCommand { .. } => None,
            Self::FileWrite { path, .. } | Self::FileDelete { path } => Some(path),
        }
    }

    /// Human-readable one-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::ShellCommand { raw } => {
                let trimmed = raw.trim();
                if trimmed.chars().count() > SUMMARY_MAX_CHARS {
                    let head: String = trimmed.chars().take(SUMMARY_MAX_CHARS).collect();
                    format!("Execute: {head}…")
                } else {
                    format!("Execute: {trimmed}")
                }
            },
            Self::FileWrite {
                path,
                change: FileChange::Content { content },
            } => format!("Write file: {} ({} bytes)", path.display(), content.len()),
            Self::FileWrite {
                path,
                change: FileChange::Edit { replace_all, .. },
            } => {
                if *replace_all {
                    format!("Edit file (all occurrences): {}", path.display())
                } else {
                    format!("Edit file: {}", path.display())
                }
            },
            Self::FileDelete { path } => format!("Delete: {}", path.display()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}
