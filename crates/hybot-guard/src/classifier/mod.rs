//! Risk classification.
//!
//! [`RiskClassifier::classify`] is deterministic and never mutates
//! anything. Shell commands are matched against an ordered rule table
//! (first match wins); file operations are checked against the workspace
//! boundary. Anything that cannot be parsed or resolved is classified as
//! dangerous under the [`UNPARSEABLE_RULE`].

mod rules;
mod split;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::boundary::{PathCheck, WorkspaceBoundary};
use crate::operation::{Operation, OperationKind};

use rules::{CommandLine, RULES};

/// Rule id assigned when a command or path cannot be interpreted.
pub const UNPARSEABLE_RULE: &str = "unparseable";

/// Rule id for file operations that leave the workspace.
pub const OUTSIDE_WORKSPACE_RULE: &str = "outside-workspace";

/// Rule id for deleting version-control metadata or the workspace itself.
pub const PROTECTED_DELETE_RULE: &str = "protected-path-delete";

/// Danger level of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// No rule matched.
    Safe,
    /// A rule matched, or the operation could not be interpreted.
    Dangerous,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Dangerous => write!(f, "dangerous"),
        }
    }
}

/// Classification result for one operation. Computed fresh, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskVerdict {
    /// Danger level.
    pub level: RiskLevel,
    /// Id of the rule that matched, if any.
    pub matched_rule: Option<String>,
    /// Human-readable explanation.
    pub reason: String,
}

impl RiskVerdict {
    /// A safe verdict.
    #[must_use]
    pub fn safe() -> Self {
        Self {
            level: RiskLevel::Safe,
            matched_rule: None,
            reason: "no dangerous pattern matched".to_string(),
        }
    }

    /// A dangerous verdict for `rule`.
    #[must_use]
    pub fn dangerous(rule: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            level: RiskLevel::Dangerous,
            matched_rule: Some(rule.into()),
            reason: reason.into(),
        }
    }

    /// The fail-safe verdict for input that could not be interpreted.
    #[must_use]
    pub fn unparseable(reason: impl Into<String>) -> Self {
        Self::dangerous(UNPARSEABLE_RULE, reason)
    }

    /// Whether the verdict is [`RiskLevel::Dangerous`].
    #[must_use]
    pub fn is_dangerous(&self) -> bool {
        self.level == RiskLevel::Dangerous
    }

    /// Key used for remember-for-session decisions.
    ///
    /// The matched rule for dangerous verdicts, the operation kind otherwise.
    #[must_use]
    pub fn rule_class(&self, kind: OperationKind) -> String {
        self.matched_rule
            .clone()
            .unwrap_or_else(|| kind.as_str().to_string())
    }
}

impl fmt::Display for RiskVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matched_rule {
            Some(rule) => write!(f, "[{}: {rule}] {}", self.level, self.reason),
            None => write!(f, "[{}] {}", self.level, self.reason),
        }
    }
}

/// Classifies operations against the rule table and workspace boundary.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    boundary: WorkspaceBoundary,
}

impl RiskClassifier {
    /// Create a classifier for the given workspace.
    #[must_use]
    pub fn new(boundary: WorkspaceBoundary) -> Self {
        Self { boundary }
    }

    /// The workspace boundary used for file operations.
    #[must_use]
    pub fn boundary(&self) -> &WorkspaceBoundary {
        &self.boundary
    }

    /// Classify an operation.
    #[must_use]
    pub fn classify(&self, operation: &Operation) -> RiskVerdict {
        let verdict = match operation {
            Operation::ShellCommand { raw } => classify_command(raw),
            Operation::FileWrite { path, .. } => self.classify_path(path, false),
            Operation::FileDelete { path } => self.classify_path(path, true),
        };
        debug!(
            operation = %operation.kind(),
            level = %verdict.level,
            rule = verdict.matched_rule.as_deref().unwrap_or("-"),
            "Classified operation"
        );
        verdict
    }

    fn classify_path(&self, path: &Path, is_delete: bool) -> RiskVerdict {
        match self.boundary.check(path) {
            PathCheck::Unresolvable(reason) => RiskVerdict::unparseable(reason),
            PathCheck::Outside(resolved) => RiskVerdict::dangerous(
                OUTSIDE_WORKSPACE_RULE,
                format!(
                    "{} is outside the workspace {}",
                    resolved.display(),
                    self.boundary.root().display()
                ),
            ),
            PathCheck::Inside(resolved) if is_delete && self.boundary.is_protected(&resolved) => {
                RiskVerdict::dangerous(
                    PROTECTED_DELETE_RULE,
                    format!("deletes protected path {}", resolved.display()),
                )
            },
            PathCheck::Inside(_) => RiskVerdict::safe(),
        }
    }
}

/// Classify a raw shell command line.
#[must_use]
pub fn classify_command(raw: &str) -> RiskVerdict {
    let Some(line) = CommandLine::parse(raw) else {
        return RiskVerdict::unparseable(
            "command could not be parsed (empty, malformed quoting, unclosed substitution or dynamic program name)",
        );
    };

    RULES
        .iter()
        .find(|rule| (rule.matches)(&line))
        .map_or_else(RiskVerdict::safe, |rule| {
            RiskVerdict::dangerous(rule.id, rule.reason)
        })
}
