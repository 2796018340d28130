//! Terminal approval responder.
//!
//! Renders the pending confirmation as a box on stderr and asks with a
//! `dialoguer` select. The select blocks on the terminal, so it runs on its
//! own thread and reports back over a oneshot channel. The gate may drop
//! the future on timeout or interrupt; the thread is then left to finish on
//! its own and never holds up runtime shutdown. Callers that read the
//! terminal again wait for it with [`CliApprovalHandler::settle`].

use std::sync::Mutex;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use dialoguer::{Select, theme::ColorfulTheme};
use hybot_guard::{ApprovalPrompt, ApprovalResponder, ResponderReply, ResponseOption};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::theme::Theme;

/// Picks one of the labels, or `None` when dismissed.
type Selector = fn(&[&'static str]) -> dialoguer::Result<Option<usize>>;

fn terminal_select(labels: &[&'static str]) -> dialoguer::Result<Option<usize>> {
    Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Allow this operation?")
        .items(labels)
        .default(0)
        .interact_opt()
}

/// Asks the human at the terminal.
#[derive(Debug)]
pub(crate) struct CliApprovalHandler {
    select: Selector,
    /// Thread of the most recent prompt.
    prompt_thread: Mutex<Option<JoinHandle<()>>>,
}

impl CliApprovalHandler {
    pub(crate) fn new() -> Self {
        Self::with_selector(terminal_select)
    }

    fn with_selector(select: Selector) -> Self {
        Self {
            select,
            prompt_thread: Mutex::new(None),
        }
    }

    /// The prompt thread, if it is still waiting for an answer nobody will
    /// read.
    fn take_abandoned(&self) -> Option<JoinHandle<()>> {
        let mut slot = self
            .prompt_thread
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        slot.take_if(|handle| !handle.is_finished())
    }

    /// Wait until an abandoned prompt has been answered or dismissed, so it
    /// does not fight the next reader for keystrokes.
    pub(crate) async fn settle(&self) {
        let Some(handle) = self.take_abandoned() else {
            return;
        };
        eprintln!(
            "{}",
            Theme::warning("An expired approval prompt is still open; press Esc to dismiss it")
        );
        match tokio::task::spawn_blocking(move || handle.join()).await {
            Ok(Ok(())) => {},
            Ok(Err(_)) => warn!("approval prompt thread panicked"),
            Err(e) => debug!(error = %e, "waiting for approval prompt failed"),
        }
    }
}

#[async_trait]
impl ApprovalResponder for CliApprovalHandler {
    async fn respond(&self, prompt: &ApprovalPrompt) -> ResponderReply {
        self.settle().await;

        eprintln!();
        eprintln!("{}", Theme::approval_box(prompt));

        let options = prompt.options.clone();
        let labels: Vec<&'static str> = options.iter().map(|o| o.label()).collect();
        let select = self.select;
        let (tx, rx) = oneshot::channel();

        let spawned = thread::Builder::new()
            .name("approval-prompt".to_string())
            .spawn(move || {
                if tx.send(select(&labels)).is_err() {
                    debug!("approval prompt answered after the gate stopped waiting");
                }
            });
        match spawned {
            Ok(handle) => {
                *self
                    .prompt_thread
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);
            },
            Err(e) => {
                warn!(error = %e, "could not start approval prompt");
                return ResponderReply::Cancelled;
            },
        }

        let choice = match rx.await {
            Ok(Ok(Some(index))) => options.get(index).copied(),
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                debug!(error = %e, "approval prompt closed");
                None
            },
            Err(_) => {
                debug!("approval prompt thread exited without answering");
                None
            },
        };

        match choice {
            Some(option) => {
                if option == ResponseOption::Deny {
                    eprintln!("{}", Theme::warning("Denied"));
                }
                ResponderReply::Decision(option.into_decision(prompt))
            },
            None => ResponderReply::Cancelled,
        }
    }
}
