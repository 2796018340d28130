//! Common imports for code that gates agent tool calls.
//!
//! ```rust,ignore
//! use hybot_guard::prelude::*;
//! ```

pub use crate::{
    ApprovalChannel, ApprovalDecision, ApprovalMode, ApprovalPrompt, ApprovalResponder,
    DenialReason, ExecutionOutcome, GateError, GateResult, GuardedExecutor, Operation, Outcome,
    ResponderReply, RiskClassifier, RiskVerdict, RunContext, SystemRunner, WorkspaceBoundary,
};
