//! Shared harness for gate integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hybot_guard::prelude::*;
use hybot_guard::{CommandOutput, FileChange, OperationRunner, RunnerError};
use tempfile::TempDir;

/// Records what would have run and never touches the system.
#[derive(Default)]
pub struct SpyRunner {
    calls: Mutex<Vec<String>>,
}

impl SpyRunner {
    /// Every primitive invocation so far, as `kind:target`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<CommandOutput, RunnerError> {
        self.calls.lock().unwrap().push(call);
        Ok(CommandOutput::ok("spy"))
    }
}

#[async_trait]
impl OperationRunner for SpyRunner {
    async fn run_shell(
        &self,
        command: &str,
        _cwd: &Path,
        _timeout: Duration,
    ) -> Result<CommandOutput, RunnerError> {
        self.record(format!("shell:{command}"))
    }

    async fn write_file(
        &self,
        path: &Path,
        _change: &FileChange,
    ) -> Result<CommandOutput, RunnerError> {
        self.record(format!("write:{}", path.display()))
    }

    async fn delete_path(&self, path: &Path) -> Result<CommandOutput, RunnerError> {
        self.record(format!("delete:{}", path.display()))
    }
}

/// Replies from a script and keeps every prompt it was shown.
pub struct ScriptedResponder {
    replies: Mutex<Vec<ResponderReply>>,
    prompts: Mutex<Vec<ApprovalPrompt>>,
}

impl ScriptedResponder {
    /// Reply with `replies` in order, then deny.
    pub fn new(replies: Vec<ResponderReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies),
            prompts: Mutex::new(Vec::new()),
        })
    }

    /// Prompts shown so far.
    pub fn prompts(&self) -> Vec<ApprovalPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ApprovalResponder for ScriptedResponder {
    async fn respond(&self, prompt: &ApprovalPrompt) -> ResponderReply {
        self.prompts.lock().unwrap().push(prompt.clone());
        let mut replies = self.replies.lock().unwrap();
        if replies.is_empty() {
            ResponderReply::Decision(ApprovalDecision::deny_once())
        } else {
            replies.remove(0)
        }
    }
}

/// Never answers.
pub struct SilentResponder;

#[async_trait]
impl ApprovalResponder for SilentResponder {
    async fn respond(&self, _prompt: &ApprovalPrompt) -> ResponderReply {
        std::future::pending().await
    }
}

/// A gated run over a temporary workspace.
pub struct GateHarness {
    /// Executor under test.
    pub executor: GuardedExecutor,
    /// The run context shared with the executor.
    pub ctx: Arc<RunContext>,
    /// Workspace root (deleted on drop).
    pub workspace: TempDir,
}

impl GateHarness {
    /// Gate backed by `runner`.
    pub fn with_runner(
        mode: ApprovalMode,
        channel: ApprovalChannel,
        runner: Arc<dyn OperationRunner>,
    ) -> Self {
        let workspace = TempDir::new().unwrap();
        let ctx = Arc::new(RunContext::new(mode));
        let classifier = RiskClassifier::new(WorkspaceBoundary::new(workspace.path()));
        let executor = GuardedExecutor::new(Arc::clone(&ctx), classifier, channel, runner);
        Self {
            executor,
            ctx,
            workspace,
        }
    }

    /// Gate backed by a spy runner.
    pub fn spy(mode: ApprovalMode, channel: ApprovalChannel) -> (Self, Arc<SpyRunner>) {
        let spy = Arc::new(SpyRunner::default());
        let harness = Self::with_runner(mode, channel, spy.clone());
        (harness, spy)
    }

    /// Gate backed by the real system, running commands with `sh`.
    pub fn system(mode: ApprovalMode, channel: ApprovalChannel) -> Self {
        Self::with_runner(mode, channel, Arc::new(SystemRunner::with_shell("sh")))
    }

    /// Path inside the workspace.
    pub fn path(&self, relative: &str) -> std::path::PathBuf {
        self.workspace.path().join(relative)
    }
}

/// Interactive channel over `responder`.
pub fn interactive(responder: Arc<dyn ApprovalResponder>) -> ApprovalChannel {
    ApprovalChannel::interactive(responder)
}

/// Reply approving once.
pub fn approve_once() -> ResponderReply {
    ResponderReply::Decision(ApprovalDecision::approve_once())
}

/// Reply denying once.
pub fn deny_once() -> ResponderReply {
    ResponderReply::Decision(ApprovalDecision::deny_once())
}
