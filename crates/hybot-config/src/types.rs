//! Configuration struct definitions.
//!
//! Every field has a serde default so a partial file (or an empty one)
//! deserializes cleanly. Defaults match `defaults.yaml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// When to ask a human.
    pub approval: ApprovalSection,
    /// Execution limits and protected paths.
    pub guard: GuardSection,
    /// Log output.
    pub logging: LoggingSection,
}

/// `approval:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalSection {
    /// `always`, `dangerous` or `never`.
    pub mode: String,
    /// Seconds to wait for a human before denying.
    pub timeout_secs: u64,
}

impl Default for ApprovalSection {
    fn default() -> Self {
        Self {
            mode: "dangerous".to_owned(),
            timeout_secs: 300,
        }
    }
}

/// `guard:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardSection {
    /// Shell used to run commands (`<shell> -c <command>`).
    pub shell: String,
    /// Seconds before a running command is killed.
    pub command_timeout_secs: u64,
    /// Globs, relative to the workspace root, whose deletion needs confirmation.
    pub protected_paths: Vec<String>,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            shell: "bash".to_owned(),
            command_timeout_secs: 120,
            protected_paths: [".git", ".hg", ".svn", ".jj", ".hybot"]
                .iter()
                .flat_map(|dir| [format!("**/{dir}"), format!("**/{dir}/**")])
                .collect(),
        }
    }
}

/// `logging:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Base level (`error` .. `trace`).
    pub level: String,
    /// `pretty`, `compact`, `json` or `full`.
    pub format: String,
    /// Rolling log file directory. Logs go to stderr when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            format: "compact".to_owned(),
            directory: None,
        }
    }
}
