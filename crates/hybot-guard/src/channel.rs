//! Approval channel: the single in-flight confirmation.
//!
//! # Flow
//!
//! 1. No responder attached -> resolve immediately with the mode's fallback
//! 2. Register the request in the run's pending slot (at most one)
//! 3. Publish [`GateEvent::ApprovalRequested`] and render the prompt
//! 4. Wait for the first of: responder answer, run interrupt, timeout
//! 5. Store remember-for-session answers in the session memory
//! 6. Clear the pending slot and publish [`GateEvent::ApprovalResolved`]
//!
//! The waiting future is the agent turn's suspension point. Nothing in the
//! run progresses past it until it resolves.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::classifier::RiskVerdict;
use crate::context::RunContext;
use crate::error::GateResult;
use crate::events::{GateEvent, ResolutionKind};
use crate::operation::Operation;
use crate::policy::ApprovalMode;
use crate::request::{ApprovalDecision, ApprovalPrompt, DecisionScope, PendingRequest, RequestId};

/// Default approval timeout (5 minutes).
pub const DEFAULT_APPROVAL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// What a responder returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderReply {
    /// The human chose.
    Decision(ApprovalDecision),
    /// The human dismissed the prompt (Ctrl-C, closed input).
    Cancelled,
}

/// Interactive surface that presents prompts and collects answers.
///
/// # Example
///
/// ```rust,ignore
/// use hybot_guard::{ApprovalDecision, ApprovalPrompt, ApprovalResponder, ResponderReply};
///
/// struct AlwaysYes;
///
/// #[async_trait::async_trait]
/// impl ApprovalResponder for AlwaysYes {
///     async fn respond(&self, _prompt: &ApprovalPrompt) -> ResponderReply {
///         ResponderReply::Decision(ApprovalDecision::approve_once())
///     }
/// }
/// ```
#[async_trait]
pub trait ApprovalResponder: Send + Sync {
    /// Present `prompt` and wait for the human's answer.
    ///
    /// The future may be dropped before it completes (timeout or interrupt).
    async fn respond(&self, prompt: &ApprovalPrompt) -> ResponderReply;
}

/// The resolved confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// The effective decision.
    pub decision: ApprovalDecision,
    /// How it was reached.
    pub kind: ResolutionKind,
    /// The pending request, absent for the non-interactive fallback.
    pub request_id: Option<RequestId>,
}

impl Resolution {
    /// Whether the operation may run.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.decision.is_approved()
    }
}

/// Decision used when no responder is attached.
///
/// Modes that only confirm dangerous operations (or never confirm) fall back
/// to approval; `always` falls back to denial.
#[must_use]
pub fn non_interactive_fallback(mode: ApprovalMode) -> ApprovalDecision {
    match mode {
        ApprovalMode::Always => ApprovalDecision::deny_once(),
        ApprovalMode::Dangerous | ApprovalMode::Never => ApprovalDecision::approve_once(),
    }
}

/// Presents confirmations and suspends the caller until they resolve.
#[derive(Clone)]
pub struct ApprovalChannel {
    responder: Option<Arc<dyn ApprovalResponder>>,
    timeout: Duration,
}

impl ApprovalChannel {
    /// A channel backed by an interactive responder.
    #[must_use]
    pub fn interactive(responder: Arc<dyn ApprovalResponder>) -> Self {
        Self {
            responder: Some(responder),
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// A channel with no responder attached.
    #[must_use]
    pub fn non_interactive() -> Self {
        Self {
            responder: None,
            timeout: DEFAULT_APPROVAL_TIMEOUT,
        }
    }

    /// Set the approval timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The approval timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether a responder is attached.
    #[must_use]
    pub fn is_interactive(&self) -> bool {
        self.responder.is_some()
    }

    /// Obtain a decision for `operation`.
    ///
    /// Denials, timeouts and cancellations are resolutions, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvariantViolation`](crate::GateError::InvariantViolation)
    /// if the run already has a pending confirmation.
    pub async fn request(
        &self,
        ctx: &RunContext,
        operation: &Operation,
        verdict: &RiskVerdict,
    ) -> GateResult<Resolution> {
        let rule_class = verdict.rule_class(operation.kind());
        let summary = operation.summary();

        let Some(responder) = &self.responder else {
            let decision = non_interactive_fallback(ctx.mode());
            info!(
                rule_class = %rule_class,
                decision = %decision,
                "No responder attached, applying non-interactive fallback"
            );
            ctx.events().publish(GateEvent::ApprovalResolved {
                request_id: None,
                summary,
                rule_class,
                resolution: ResolutionKind::NonInteractiveFallback,
                outcome: decision.outcome,
            });
            return Ok(Resolution {
                decision,
                kind: ResolutionKind::NonInteractiveFallback,
                request_id: None,
            });
        };

        let pending = PendingRequest::new(operation.clone(), verdict.clone());
        let prompt = ApprovalPrompt::for_request(&pending, rule_class.clone());
        let guard = ctx.begin_request(pending)?;
        let request_id = guard.id().clone();

        ctx.events().publish(GateEvent::ApprovalRequested {
            request_id: request_id.clone(),
            summary: summary.clone(),
            rule_class: rule_class.clone(),
        });
        info!(request_id = %request_id, rule_class = %rule_class, "Awaiting confirmation");

        let interrupt = ctx.interrupt_token();
        let (decision, kind) = tokio::select! {
            biased;
            () = interrupt.cancelled() => {
                (ApprovalDecision::deny_once(), ResolutionKind::Cancelled)
            }
            reply = responder.respond(&prompt) => match reply {
                ResponderReply::Decision(decision) => (decision, ResolutionKind::Responder),
                ResponderReply::Cancelled => {
                    (ApprovalDecision::deny_once(), ResolutionKind::Cancelled)
                },
            },
            () = tokio::time::sleep(self.timeout) => {
                (ApprovalDecision::deny_once(), ResolutionKind::Timeout)
            }
        };

        let decision = match kind {
            ResolutionKind::Responder => remember_decision(ctx, decision, &rule_class),
            ResolutionKind::Cancelled => {
                warn!(request_id = %request_id, "Confirmation cancelled, aborting turn");
                ctx.abort_turn();
                decision
            },
            ResolutionKind::Timeout => {
                warn!(
                    request_id = %request_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Confirmation timed out, denying"
                );
                decision
            },
            ResolutionKind::Remembered | ResolutionKind::NonInteractiveFallback => decision,
        };

        drop(guard);

        info!(
            request_id = %request_id,
            resolution = ?kind,
            decision = %decision,
            "Confirmation resolved"
        );
        ctx.events().publish(GateEvent::ApprovalResolved {
            request_id: Some(request_id.clone()),
            summary,
            rule_class,
            resolution: kind,
            outcome: decision.outcome,
        });

        Ok(Resolution {
            decision,
            kind,
            request_id: Some(request_id),
        })
    }
}

impl std::fmt::Debug for ApprovalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalChannel")
            .field("interactive", &self.is_interactive())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Store a remember-for-session answer under the request's own rule class.
fn remember_decision(
    ctx: &RunContext,
    decision: ApprovalDecision,
    rule_class: &str,
) -> ApprovalDecision {
    let DecisionScope::RememberForSession(class) = &decision.scope else {
        return decision;
    };
    if class != rule_class {
        warn!(
            requested = %class,
            actual = %rule_class,
            "Responder remembered a different rule class, using the request's"
        );
    }
    ctx.memory().remember(rule_class, decision.outcome);
    ApprovalDecision::remember(decision.outcome, rule_class)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GateState;
    use crate::error::GateError;
    use crate::request::Outcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct FixedResponder {
        reply: ResponderReply,
        calls: AtomicUsize,
    }

    impl FixedResponder {
        fn new(reply: ResponderReply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ApprovalResponder for FixedResponder {
        async fn respond(&self, _prompt: &ApprovalPrompt) -> ResponderReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply.clone()
        }
    }

    /// Never answers.
    struct SilentResponder;

    #[async_trait]
    impl ApprovalResponder for SilentResponder {
        async fn respond(&self, _prompt: &ApprovalPrompt) -> ResponderReply {
            std::future::pending().await
        }
    }

    /// Answers once released.
    struct GatedResponder {
        release: Notify,
    }

    #[async_trait]
    impl ApprovalResponder for GatedResponder {
        async fn respond(&self, _prompt: &ApprovalPrompt) -> ResponderReply {
            self.release.notified().await;
            ResponderReply::Decision(ApprovalDecision::approve_once())
        }
    }

    fn sudo() -> (Operation, RiskVerdict) {
        (
            Operation::shell("sudo apt update"),
            RiskVerdict::dangerous("privilege-escalation", "runs as root"),
        )
    }

    #[tokio::test]
    async fn test_responder_decision_is_returned() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let responder = FixedResponder::new(ResponderReply::Decision(ApprovalDecision::deny_once()));
        let channel = ApprovalChannel::interactive(responder.clone());
        let (op, verdict) = sudo();

        let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
        assert!(!resolution.is_approved());
        assert_eq!(resolution.kind, ResolutionKind::Responder);
        assert!(resolution.request_id.is_some());
        assert_eq!(responder.calls.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.state(), GateState::Idle);
        assert!(ctx.memory().is_empty());
    }

    #[tokio::test]
    async fn test_remember_for_session_is_stored() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let responder = FixedResponder::new(ResponderReply::Decision(ApprovalDecision::remember(
            Outcome::Approve,
            "privilege-escalation",
        )));
        let channel = ApprovalChannel::interactive(responder);
        let (op, verdict) = sudo();

        let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
        assert!(resolution.is_approved());
        assert_eq!(
            ctx.memory().recall("privilege-escalation"),
            Some(Outcome::Approve)
        );
    }

    #[tokio::test]
    async fn test_remember_uses_request_rule_class() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let responder = FixedResponder::new(ResponderReply::Decision(ApprovalDecision::remember(
            Outcome::Approve,
            "something-else",
        )));
        let channel = ApprovalChannel::interactive(responder);
        let (op, verdict) = sudo();

        let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
        assert_eq!(
            resolution.decision.remembered_class(),
            Some("privilege-escalation")
        );
        assert_eq!(ctx.memory().recall("something-else"), None);
        assert_eq!(
            ctx.memory().recall("privilege-escalation"),
            Some(Outcome::Approve)
        );
    }

    #[tokio::test]
    async fn test_timeout_denies_without_remembering() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let channel = ApprovalChannel::interactive(Arc::new(SilentResponder))
            .with_timeout(Duration::from_millis(50));
        let (op, verdict) = sudo();

        let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Timeout);
        assert_eq!(resolution.decision, ApprovalDecision::deny_once());
        assert!(ctx.memory().is_empty());
        assert_eq!(ctx.state(), GateState::Idle);
        assert!(!ctx.is_turn_aborted());
    }

    #[tokio::test]
    async fn test_interrupt_cancels_and_aborts_turn() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let channel = ApprovalChannel::interactive(Arc::new(SilentResponder));
        let (op, verdict) = sudo();

        let (resolution, ()) = tokio::join!(channel.request(&ctx, &op, &verdict), async {
            while ctx.state() != GateState::AwaitingApproval {
                tokio::task::yield_now().await;
            }
            ctx.interrupt();
        });

        let resolution = resolution.unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Cancelled);
        assert!(!resolution.is_approved());
        assert!(ctx.is_turn_aborted());
        assert_eq!(ctx.state(), GateState::Idle);
    }

    #[tokio::test]
    async fn test_responder_cancel_aborts_turn() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let channel =
            ApprovalChannel::interactive(FixedResponder::new(ResponderReply::Cancelled));
        let (op, verdict) = sudo();

        let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
        assert_eq!(resolution.kind, ResolutionKind::Cancelled);
        assert!(ctx.is_turn_aborted());
    }

    #[tokio::test]
    async fn test_second_request_while_pending_is_invariant_violation() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let responder = Arc::new(GatedResponder {
            release: Notify::new(),
        });
        let channel = ApprovalChannel::interactive(responder.clone());
        let (op, verdict) = sudo();

        let (first, second) = tokio::join!(channel.request(&ctx, &op, &verdict), async {
            while ctx.state() != GateState::AwaitingApproval {
                tokio::task::yield_now().await;
            }
            let second = channel
                .request(&ctx, &Operation::shell("sudo reboot"), &verdict)
                .await;
            responder.release.notify_one();
            second
        });

        assert!(matches!(second, Err(GateError::InvariantViolation(_))));
        // The first request still resolves normally.
        assert!(first.unwrap().is_approved());
        assert_eq!(ctx.state(), GateState::Idle);
    }

    #[tokio::test]
    async fn test_non_interactive_fallback_per_mode() {
        let (op, verdict) = sudo();
        let channel = ApprovalChannel::non_interactive();

        for (mode, approved) in [
            (ApprovalMode::Always, false),
            (ApprovalMode::Dangerous, true),
            (ApprovalMode::Never, true),
        ] {
            let ctx = RunContext::new(mode);
            let resolution = channel.request(&ctx, &op, &verdict).await.unwrap();
            assert_eq!(resolution.kind, ResolutionKind::NonInteractiveFallback);
            assert_eq!(resolution.is_approved(), approved, "mode {mode}");
            assert!(resolution.request_id.is_none());
        }
    }

    #[tokio::test]
    async fn test_events_published() {
        let ctx = RunContext::new(ApprovalMode::Dangerous);
        let mut rx = ctx.events().subscribe();
        let channel = ApprovalChannel::interactive(FixedResponder::new(ResponderReply::Decision(
            ApprovalDecision::approve_once(),
        )));
        let (op, verdict) = sudo();

        channel.request(&ctx, &op, &verdict).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(*first, GateEvent::ApprovalRequested { .. }));
        let second = rx.recv().await.unwrap();
        match &*second {
            GateEvent::ApprovalResolved {
                resolution,
                outcome,
                ..
            } => {
                assert_eq!(*resolution, ResolutionKind::Responder);
                assert_eq!(*outcome, Outcome::Approve);
            },
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
