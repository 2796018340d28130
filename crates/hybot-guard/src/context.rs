//! Run-scoped gate state.
//!
//! One [`RunContext`] exists per run. It owns the approval mode, the session
//! approval memory, the single pending-request slot, the interrupt token and
//! the event bus. Nothing here is process-global, so two runs in the same
//! process never see each other's state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{GateError, GateResult};
use crate::events::EventBus;
use crate::memory::SessionApprovalMemory;
use crate::policy::ApprovalMode;
use crate::request::{PendingRequest, RequestId};

/// Observable gate state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// No confirmation outstanding.
    Idle,
    /// The run is suspended on a confirmation.
    AwaitingApproval,
}

/// State owned by one agent run.
#[derive(Debug)]
pub struct RunContext {
    mode: ApprovalMode,
    memory: SessionApprovalMemory,
    pending: Mutex<Option<PendingRequest>>,
    interrupt: Mutex<CancellationToken>,
    turn_aborted: AtomicBool,
    events: EventBus,
}

impl RunContext {
    /// Create a fresh context: empty memory, no pending request.
    #[must_use]
    pub fn new(mode: ApprovalMode) -> Self {
        Self {
            mode,
            memory: SessionApprovalMemory::new(),
            pending: Mutex::new(None),
            interrupt: Mutex::new(CancellationToken::new()),
            turn_aborted: AtomicBool::new(false),
            events: EventBus::new(),
        }
    }

    /// The approval mode, fixed for the run.
    #[must_use]
    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }

    /// Session approval memory.
    #[must_use]
    pub fn memory(&self) -> &SessionApprovalMemory {
        &self.memory
    }

    /// Event bus for gate events.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        if self.pending().is_some() {
            GateState::AwaitingApproval
        } else {
            GateState::Idle
        }
    }

    /// A copy of the pending request, if any.
    #[must_use]
    pub fn pending(&self) -> Option<PendingRequest> {
        self.lock_pending().ok().and_then(|slot| slot.clone())
    }

    /// Register `request` as the single pending confirmation.
    ///
    /// The returned guard clears the slot when dropped, whichever way the
    /// wait ends.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::InvariantViolation`] if a request is already
    /// pending. The caller must treat this as fatal for the run.
    pub fn begin_request(&self, request: PendingRequest) -> GateResult<PendingGuard<'_>> {
        let mut slot = self.lock_pending()?;
        if let Some(existing) = slot.as_ref() {
            return Err(GateError::InvariantViolation(format!(
                "confirmation requested for '{}' while {} is still pending",
                request.operation.summary(),
                existing.id
            )));
        }
        let id = request.id.clone();
        debug!(request_id = %id, "Confirmation pending");
        *slot = Some(request);
        Ok(PendingGuard { ctx: self, id })
    }

    /// Token cancelled by [`RunContext::interrupt`].
    #[must_use]
    pub fn interrupt_token(&self) -> CancellationToken {
        match self.interrupt.lock() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Interrupt the run. Any confirmation currently waiting resolves as
    /// cancelled.
    pub fn interrupt(&self) {
        info!("Run interrupted");
        self.interrupt_token().cancel();
    }

    /// Start a new agent turn: re-arm the interrupt token and clear the
    /// abort flag. Session memory is kept.
    pub fn begin_turn(&self) {
        let mut token = match self.interrupt.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        };
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        self.turn_aborted.store(false, Ordering::SeqCst);
    }

    /// Mark the current turn as aborted.
    pub fn abort_turn(&self) {
        self.turn_aborted.store(true, Ordering::SeqCst);
    }

    /// Whether the current turn was aborted by a cancellation.
    #[must_use]
    pub fn is_turn_aborted(&self) -> bool {
        self.turn_aborted.load(Ordering::SeqCst)
    }

    fn lock_pending(&self) -> GateResult<MutexGuard<'_, Option<PendingRequest>>> {
        self.pending
            .lock()
            .map_err(|e| GateError::Internal(format!("pending slot lock poisoned: {e}")))
    }

    fn clear_pending(&self, id: &RequestId) {
        let mut slot = match self.pending.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if slot.as_ref().is_some_and(|p| &p.id == id) {
            *slot = None;
            debug!(request_id = %id, "Confirmation cleared");
        }
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(ApprovalMode::default())
    }
}

/// Clears the pending slot on drop.
#[derive(Debug)]
pub struct PendingGuard<'a> {
    ctx: &'a RunContext,
    id: RequestId,
}

impl PendingGuard<'_> {
    /// The pending request's identifier.
    #[must_use]
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.ctx.clear_pending(&self.id);
    }
}
