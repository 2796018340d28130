//! Approval request and decision types.
//!
//! A [`PendingRequest`] is the gate's internal record of the one in-flight
//! confirmation. An [`ApprovalPrompt`] is what the interactive responder
//! renders. The responder answers with an [`ApprovalDecision`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::classifier::RiskVerdict;
use crate::operation::Operation;

/// Unique identifier for an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    /// Create a new random request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req:{}", self.0)
    }
}

/// Approve or deny.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Let the operation run.
    Approve,
    /// Do not run the operation.
    Deny,
}

impl Outcome {
    /// Whether this is [`Outcome::Approve`].
    #[must_use]
    pub fn is_approved(self) -> bool {
        self == Self::Approve
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Approve => write!(f, "approve"),
            Self::Deny => write!(f, "deny"),
        }
    }
}

/// How long a decision applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "rule_class")]
pub enum DecisionScope {
    /// Only this request.
    Once,
    /// Every request of the given rule class for the rest of the run.
    RememberForSession(String),
}

/// A decision on an approval request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    /// Approve or deny.
    pub outcome: Outcome,
    /// Once or remembered for the session.
    pub scope: DecisionScope,
}

impl ApprovalDecision {
    /// Approve this request only.
    #[must_use]
    pub fn approve_once() -> Self {
        Self {
            outcome: Outcome::Approve,
            scope: DecisionScope::Once,
        }
    }

    /// Deny this request only.
    #[must_use]
    pub fn deny_once() -> Self {
        Self {
            outcome: Outcome::Deny,
            scope: DecisionScope::Once,
        }
    }

    /// Apply `outcome` to every request of `rule_class` for the rest of the run.
    #[must_use]
    pub fn remember(outcome: Outcome, rule_class: impl Into<String>) -> Self {
        Self {
            outcome,
            scope: DecisionScope::RememberForSession(rule_class.into()),
        }
    }

    /// Whether the operation may run.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.outcome.is_approved()
    }

    /// The rule class to remember, if any.
    #[must_use]
    pub fn remembered_class(&self) -> Option<&str> {
        match &self.scope {
            DecisionScope::Once => None,
            DecisionScope::RememberForSession(class) => Some(class),
        }
    }
}

impl fmt::Display for ApprovalDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            DecisionScope::Once => write!(f, "{} (once)", self.outcome),
            DecisionScope::RememberForSession(class) => {
                write!(f, "{} (session: {class})", self.outcome)
            },
        }
    }
}

/// The single in-flight confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Request identifier.
    pub id: RequestId,
    /// The operation awaiting a decision.
    pub operation: Operation,
    /// Its classification.
    pub verdict: RiskVerdict,
    /// When the request was registered.
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    /// Create a new pending request.
    #[must_use]
    pub fn new(operation: Operation, verdict: RiskVerdict) -> Self {
        Self {
            id: RequestId::new(),
            operation,
            verdict,
            created_at: Utc::now(),
        }
    }
}

/// The answers offered to the human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseOption {
    /// Run this operation.
    ApproveOnce,
    /// Run this and every later operation of the same rule class.
    ApproveForSession,
    /// Do not run this operation.
    Deny,
}

impl ResponseOption {
    /// All options in display order.
    pub const ALL: [Self; 3] = [Self::ApproveOnce, Self::ApproveForSession, Self::Deny];

    /// Label shown in the prompt.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::ApproveOnce => "Approve (once)",
            Self::ApproveForSession => "Approve (always for this kind of action, this session)",
            Self::Deny => "Deny",
        }
    }

    /// Turn the selected option into a decision for `prompt`.
    #[must_use]
    pub fn into_decision(self, prompt: &ApprovalPrompt) -> ApprovalDecision {
        match self {
            Self::ApproveOnce => ApprovalDecision::approve_once(),
            Self::ApproveForSession => {
                ApprovalDecision::remember(Outcome::Approve, prompt.rule_class.clone())
            },
            Self::Deny => ApprovalDecision::deny_once(),
        }
    }
}

/// What the interactive surface displays for a pending request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    /// The pending request this prompt belongs to.
    pub request_id: RequestId,
    /// One-line operation summary.
    pub summary: String,
    /// Matched rule, if the operation is dangerous.
    pub matched_rule: Option<String>,
    /// Why confirmation is needed.
    pub reason: String,
    /// Key a remember-for-session answer is stored under.
    pub rule_class: String,
    /// Options the human may choose from.
    pub options: Vec<ResponseOption>,
}

impl ApprovalPrompt {
    /// Build the prompt for a pending request.
    #[must_use]
    pub fn for_request(request: &PendingRequest, rule_class: impl Into<String>) -> Self {
        Self {
            request_id: request.id.clone(),
            summary: request.operation.summary(),
            matched_rule: request.verdict.matched_rule.clone(),
            reason: request.verdict.reason.clone(),
            rule_class: rule_class.into(),
            options: ResponseOption::ALL.to_vec(),
        }
    }
}

impl fmt::Display for ApprovalPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Operation: {}", self.summary)?;
        match &self.matched_rule {
            Some(rule) => writeln!(f, "Risk:      {rule} ({})", self.reason)?,
            None => writeln!(f, "Risk:      {}", self.reason)?,
        }
        write!(f, "Options:   ")?;
        let labels: Vec<&str> = self.options.iter().map(|o| o.label()).collect();
        write!(f, "{}", labels.join(" / "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_display() {
        let id = RequestId::new();
        assert!(id.to_string().starts_with("req:"));
    }

    #[test]
    fn test_decision_helpers() {
        assert!(ApprovalDecision::approve_once().is_approved());
        assert!(!ApprovalDecision::deny_once().is_approved());
        assert_eq!(ApprovalDecision::approve_once().remembered_class(), None);

        let remembered = ApprovalDecision::remember(Outcome::Approve, "git-force-push");
        assert_eq!(remembered.remembered_class(), Some("git-force-push"));
        assert_eq!(remembered.to_string(), "approve (session: git-force-push)");
    }

    #[test]
    fn test_option_into_decision() {
        let pending = PendingRequest::new(
            Operation::shell("sudo ls"),
            RiskVerdict::dangerous("privilege-escalation", "runs as root"),
        );
        let prompt = ApprovalPrompt::for_request(&pending, "privilege-escalation");

        assert_eq!(
            ResponseOption::ApproveOnce.into_decision(&prompt),
            ApprovalDecision::approve_once()
        );
        assert_eq!(
            ResponseOption::ApproveForSession.into_decision(&prompt),
            ApprovalDecision::remember(Outcome::Approve, "privilege-escalation")
        );
        assert_eq!(
            ResponseOption::Deny.into_decision(&prompt),
            ApprovalDecision::deny_once()
        );
    }

    #[test]
    fn test_prompt_display() {
        let pending = PendingRequest::new(
            Operation::shell("dd if=a of=b"),
            RiskVerdict::dangerous("raw-disk-write", "copies raw blocks with dd"),
        );
        let prompt = ApprovalPrompt::for_request(&pending, "raw-disk-write");
        let text = prompt.to_string();
        assert!(text.contains("Execute: dd if=a of=b"));
        assert!(text.contains("raw-disk-write (copies raw blocks with dd)"));
        assert!(text.contains("Deny"));
    }
}
