//! Guarded executor: the tool-call boundary.
//!
//! # Flow
//!
//! 1. Turn already aborted -> `Denied(Cancelled)`
//! 2. Classify the operation
//! 3. Evaluate policy and session memory
//! 4. Ask the approval channel when confirmation is needed
//! 5. Denied -> return without touching the runner
//! 6. Approved -> run the primitive with a bounded timeout

use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::channel::ApprovalChannel;
use crate::classifier::RiskClassifier;
use crate::context::RunContext;
use crate::error::GateResult;
use crate::events::{GateEvent, ResolutionKind};
use crate::operation::Operation;
use crate::policy::{ApprovalPolicy, PolicyDecision};
use crate::request::Outcome;
use crate::runner::{CommandOutput, DEFAULT_COMMAND_TIMEOUT, OperationRunner, RunnerError};

/// Why an operation was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// The human denied it.
    User,
    /// A remembered session decision denied it.
    Remembered,
    /// Nobody answered in time.
    Timeout,
    /// The run was interrupted.
    Cancelled,
    /// No responder attached and the mode fails closed.
    NonInteractive,
}

impl DenialReason {
    fn from_resolution(kind: ResolutionKind) -> Self {
        match kind {
            ResolutionKind::Responder => Self::User,
            ResolutionKind::Remembered => Self::Remembered,
            ResolutionKind::Timeout => Self::Timeout,
            ResolutionKind::Cancelled => Self::Cancelled,
            ResolutionKind::NonInteractiveFallback => Self::NonInteractive,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let why = match self {
            Self::User => "the user denied this operation",
            Self::Remembered => "the user denied this kind of operation for the rest of the session",
            Self::Timeout => "no approval was given before the timeout",
            Self::Cancelled => "the user interrupted the run",
            Self::NonInteractive => "approval is required but no one is available to approve it",
        };
        write!(f, "{why}. Do not retry it automatically.")
    }
}

/// Result of one tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The primitive ran to completion (any exit code).
    Executed {
        /// Captured stdout.
        stdout: String,
        /// Captured stderr.
        stderr: String,
        /// Exit code.
        exit_code: i32,
    },
    /// The operation was not attempted.
    Denied {
        /// Why.
        reason: DenialReason,
    },
    /// The primitive could not complete.
    Failed {
        /// What went wrong.
        error: String,
    },
}

impl ExecutionOutcome {
    /// Whether the operation was denied.
    #[must_use]
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }

    /// Whether the operation ran.
    #[must_use]
    pub fn is_executed(&self) -> bool {
        matches!(self, Self::Executed { .. })
    }
}

impl From<CommandOutput> for ExecutionOutcome {
    fn from(output: CommandOutput) -> Self {
        Self::Executed {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code: output.exit_code,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Executed {
                stdout,
                stderr,
                exit_code,
            } => {
                let mut parts = Vec::new();
                if !stdout.is_empty() {
                    parts.push(stdout.trim_end().to_string());
                }
                if !stderr.is_empty() {
                    parts.push(format!("STDERR:\n{}", stderr.trim_end()));
                }
                if *exit_code != 0 {
                    parts.push(format!("(exit code: {exit_code})"));
                }
                if parts.is_empty() {
                    write!(f, "(no output)")
                } else {
                    write!(f, "{}", parts.join("\n"))
                }
            },
            Self::Denied { reason } => write!(f, "Operation denied: {reason}"),
            Self::Failed { error } => write!(f, "Operation failed: {error}"),
        }
    }
}

/// Gate around the execution primitives for one run.
pub struct GuardedExecutor {
    ctx: Arc<RunContext>,
    classifier: RiskClassifier,
    policy: ApprovalPolicy,
    channel: ApprovalChannel,
    runner: Arc<dyn OperationRunner>,
    command_timeout: Duration,
}

impl GuardedExecutor {
    /// Create an executor. The policy mode comes from `ctx`.
    #[must_use]
    pub fn new(
        ctx: Arc<RunContext>,
        classifier: RiskClassifier,
        channel: ApprovalChannel,
        runner: Arc<dyn OperationRunner>,
    ) -> Self {
        let policy = ApprovalPolicy::new(ctx.mode());
        Self {
            ctx,
            classifier,
            policy,
            channel,
            runner,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Set the per-command timeout.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// The run context.
    #[must_use]
    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    /// The classifier.
    #[must_use]
    pub fn classifier(&self) -> &RiskClassifier {
        &self.classifier
    }

    /// Gate and, if allowed, attempt `operation`.
    ///
    /// # Errors
    ///
    /// Returns a [`GateError`](crate::GateError) only when a gate invariant is
    /// violated. The run must stop.
    pub async fn execute(&self, operation: &Operation) -> GateResult<ExecutionOutcome> {
        if self.ctx.is_turn_aborted() {
            debug!(operation = %operation.kind(), "Turn aborted, refusing operation");
            return Ok(ExecutionOutcome::Denied {
                reason: DenialReason::Cancelled,
            });
        }

        let verdict = self.classifier.classify(operation);

        match self
            .policy
            .evaluate(&verdict, operation.kind(), self.ctx.memory())
        {
            PolicyDecision::Proceed => {},
            PolicyDecision::Remembered {
                rule_class,
                outcome,
            } => {
                info!(rule_class = %rule_class, outcome = %outcome, "Using remembered decision");
                self.ctx.events().publish(GateEvent::ApprovalResolved {
                    request_id: None,
                    summary: operation.summary(),
                    rule_class,
                    resolution: ResolutionKind::Remembered,
                    outcome,
                });
                if outcome == Outcome::Deny {
                    return Ok(ExecutionOutcome::Denied {
                        reason: DenialReason::Remembered,
                    });
                }
            },
            PolicyDecision::Confirm { .. } => {
                let resolution = self.channel.request(&self.ctx, operation, &verdict).await?;
                if !resolution.is_approved() {
                    return Ok(ExecutionOutcome::Denied {
                        reason: DenialReason::from_resolution(resolution.kind),
                    });
                }
            },
        }

        Ok(match self.attempt(operation).await {
            Ok(output) => output.into(),
            Err(e) => {
                warn!(operation = %operation.kind(), error = %e, "Operation failed");
                ExecutionOutcome::Failed {
                    error: e.to_string(),
                }
            },
        })
    }

    async fn attempt(&self, operation: &Operation) -> Result<CommandOutput, AttemptError> {
        let boundary = self.classifier.boundary();
        match operation {
            Operation::ShellCommand { raw } => Ok(self
                .runner
                .run_shell(raw, boundary.root(), self.command_timeout)
                .await?),
            Operation::FileWrite { path, change } => {
                let target = lexical_target(boundary, path)?;
                Ok(self.runner.write_file(&target, change).await?)
            },
            Operation::FileDelete { path } => {
                let target = lexical_target(boundary, path)?;
                Ok(self.runner.delete_path(&target).await?)
            },
        }
    }
}

impl fmt::Debug for GuardedExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedExecutor")
            .field("mode", &self.policy.mode())
            .field("channel", &self.channel)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error("invalid path: {0}")]
    Path(String),
    #[error(transparent)]
    Runner(#[from] RunnerError),
}

/// The runner gets the link itself, never its canonical target; containment
/// was already decided on the resolved path during classification.
fn lexical_target(
    boundary: &crate::boundary::WorkspaceBoundary,
    path: &Path,
) -> Result<std::path::PathBuf, AttemptError> {
    boundary.lexical_target(path).map_err(AttemptError::Path)
}
