//! Gate event broadcast.
//!
//! The channel publishes a [`GateEvent`] when a confirmation is requested and
//! when it is resolved. Subscribers (the CLI status line, tests, audit
//! sinks) receive every event published after they subscribe.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::request::{Outcome, RequestId};

/// Default channel capacity for the event bus.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// How a confirmation was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// The responder answered.
    Responder,
    /// A remembered session decision was reused.
    Remembered,
    /// No answer within the approval timeout.
    Timeout,
    /// The run was interrupted while waiting.
    Cancelled,
    /// No responder attached; the mode's fallback applied.
    NonInteractiveFallback,
}

/// Events emitted by the approval channel.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GateEvent {
    /// The run is now waiting for a human.
    ApprovalRequested {
        /// Pending request identifier.
        request_id: RequestId,
        /// One-line operation summary.
        summary: String,
        /// Rule class of the verdict.
        rule_class: String,
    },
    /// A confirmation was resolved.
    ApprovalResolved {
        /// Pending request identifier, absent when no request was registered.
        request_id: Option<RequestId>,
        /// One-line operation summary.
        summary: String,
        /// Rule class of the verdict.
        rule_class: String,
        /// How it was resolved.
        resolution: ResolutionKind,
        /// The resulting outcome.
        outcome: Outcome,
    },
}

impl GateEvent {
    /// Short event name for logging.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ApprovalRequested { .. } => "approval_requested",
            Self::ApprovalResolved { .. } => "approval_resolved",
        }
    }
}

/// Broadcast bus for [`GateEvent`]s. Clones share the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Arc<GateEvent>>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a bus with the given capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event. Returns the number of receivers that got it.
    pub fn publish(&self, event: GateEvent) -> usize {
        let event = Arc::new(event);
        if let Ok(count) = self.sender.send(Arc::clone(&event)) {
            debug!(event_type = event.event_type(), receiver_count = count, "Gate event published");
            count
        } else {
            trace!(event_type = event.event_type(), "No receivers for gate event");
            0
        }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<GateEvent>> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
