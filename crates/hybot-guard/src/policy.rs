//! Approval policy: when does an operation need a human?
//!
//! # Decision Order
//!
//! 1. Does the mode require confirmation for this verdict? If not -> `Proceed`
//! 2. Is there a remembered decision for the verdict's rule class? -> `Remembered`
//! 3. Otherwise -> `Confirm`
//!
//! Memory is only consulted when confirmation would otherwise be required,
//! so a remembered deny never blocks an operation the mode lets through.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::classifier::RiskVerdict;
use crate::memory::SessionApprovalMemory;
use crate::operation::OperationKind;
use crate::request::Outcome;

/// Configured strictness. Constant for the lifetime of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalMode {
    /// Confirm every operation, safe or not.
    Always,
    /// Confirm dangerous operations only.
    #[default]
    Dangerous,
    /// Never confirm.
    Never,
}

impl fmt::Display for ApprovalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Dangerous => write!(f, "dangerous"),
            Self::Never => write!(f, "never"),
        }
    }
}

impl FromStr for ApprovalMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "dangerous" => Ok(Self::Dangerous),
            "never" => Ok(Self::Never),
            other => Err(format!(
                "unknown approval mode '{other}' (expected always, dangerous or never)"
            )),
        }
    }
}

/// Whether `verdict` needs confirmation under `mode`, ignoring memory.
#[must_use]
pub fn requires_confirmation(verdict: &RiskVerdict, mode: ApprovalMode) -> bool {
    match mode {
        ApprovalMode::Always => true,
        ApprovalMode::Dangerous => verdict.is_dangerous(),
        ApprovalMode::Never => false,
    }
}

/// What the executor should do before running an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Run without asking.
    Proceed,
    /// Reuse a remembered decision for the rule class.
    Remembered {
        /// The rule class that matched.
        rule_class: String,
        /// The remembered outcome.
        outcome: Outcome,
    },
    /// Ask the human.
    Confirm {
        /// The rule class a remember-for-session answer would be stored under.
        rule_class: String,
    },
}

/// Approval policy for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalPolicy {
    mode: ApprovalMode,
}

impl ApprovalPolicy {
    /// Create a policy for `mode`.
    #[must_use]
    pub fn new(mode: ApprovalMode) -> Self {
        Self { mode }
    }

    /// The configured mode.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// See [`requires_confirmation`].
    #[must_use]
    pub fn requires_confirmation(&self, verdict: &RiskVerdict) -> bool {
        requires_confirmation(verdict, self.mode)
    }

    /// Combine the mode check with the session memory.
    #[must_use]
    pub fn evaluate(
        &self,
        verdict: &RiskVerdict,
        kind: OperationKind,
        memory: &SessionApprovalMemory,
    ) -> PolicyDecision {
        if !self.requires_confirmation(verdict) {
            return PolicyDecision::Proceed;
        }

        let rule_class = verdict.rule_class(kind);
        match memory.recall(&rule_class) {
            Some(outcome) => PolicyDecision::Remembered {
                rule_class,
                outcome,
            },
            None => PolicyDecision::Confirm { rule_class },
        }
    }
}
