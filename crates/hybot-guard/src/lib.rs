//! HyBot Guard - Guarded execution gate for agent tool calls.
//!
//! This crate decides whether a shell command or file mutation proposed by
//! the agent is *attempted*, and suspends the agent's turn while a human
//! confirms the risky ones.
//!
//! # Components
//!
//! - **Risk classification**: [`RiskClassifier`] maps an [`Operation`] to a
//!   [`RiskVerdict`] using a flat, ordered rule table and workspace
//!   containment checks.
//! - **Approval policy**: [`ApprovalPolicy`] combines the verdict, the
//!   configured [`ApprovalMode`] and the [`SessionApprovalMemory`].
//! - **Approval channel**: [`ApprovalChannel`] owns the single in-flight
//!   confirmation and waits for an [`ApprovalResponder`], a cancellation, or
//!   a timeout.
//! - **Guarded executor**: [`GuardedExecutor`] ties it together around an
//!   [`OperationRunner`] and reports an [`ExecutionOutcome`].
//!
//! All run-scoped state (pending request, session memory, interrupt token,
//! event bus) lives in a [`RunContext`] owned by the run.
//!
//! # Example
//!
//! ```
//! use hybot_guard::{Operation, RiskClassifier, WorkspaceBoundary};
//!
//! let classifier = RiskClassifier::new(WorkspaceBoundary::new("/home/user/project"));
//!
//! let verdict = classifier.classify(&Operation::shell("rm -rf /tmp/testdir"));
//! assert!(verdict.is_dangerous());
//! assert_eq!(verdict.matched_rule.as_deref(), Some("recursive-force-delete"));
//!
//! let verdict = classifier.classify(&Operation::shell("git status"));
//! assert!(!verdict.is_dangerous());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod boundary;
pub mod channel;
pub mod classifier;
pub mod context;
/// Error types and results for the gate.
pub mod error;
pub mod events;
pub mod executor;
pub mod memory;
pub mod operation;
pub mod policy;
pub mod request;
pub mod runner;

pub use boundary::{DEFAULT_PROTECTED_PATTERNS, PathCheck, WorkspaceBoundary};
pub use channel::{
    ApprovalChannel, ApprovalResponder, DEFAULT_APPROVAL_TIMEOUT, Resolution, ResponderReply,
    non_interactive_fallback,
};
pub use classifier::{
    OUTSIDE_WORKSPACE_RULE, PROTECTED_DELETE_RULE, RiskClassifier, RiskLevel, RiskVerdict,
    UNPARSEABLE_RULE, classify_command,
};
pub use context::{GateState, PendingGuard, RunContext};
pub use error::{GateError, GateResult};
pub use events::{EventBus, GateEvent, ResolutionKind};
pub use executor::{DenialReason, ExecutionOutcome, GuardedExecutor};
pub use memory::SessionApprovalMemory;
pub use operation::{FileChange, Operation, OperationKind};
pub use policy::{ApprovalMode, ApprovalPolicy, PolicyDecision, requires_confirmation};
pub use request::{
    ApprovalDecision, ApprovalPrompt, DecisionScope, Outcome, PendingRequest, RequestId,
    ResponseOption,
};
pub use runner::{
    CommandOutput, DEFAULT_COMMAND_TIMEOUT, DEFAULT_SHELL, OperationRunner, RunnerError,
    SystemRunner,
};
