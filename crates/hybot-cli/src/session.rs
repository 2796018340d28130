//! Per-invocation gate setup.
//!
//! A [`GateSession`] owns one run: its [`RunContext`], the executor wired
//! to the terminal (or to nothing, when non-interactive) and the Ctrl-C
//! listener that interrupts pending confirmations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use dialoguer::{Confirm, theme::ColorfulTheme};
use hybot_config::{Config, TrustStore, hybot_home, init_workspace};
use hybot_guard::{
    ApprovalChannel, ApprovalMode, GuardedExecutor, RiskClassifier, RunContext, SystemRunner,
};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::approval_handler::CliApprovalHandler;
use crate::config_bridge;
use crate::theme::Theme;

/// Flags that shape a run.
#[derive(Debug, Clone)]
pub(crate) struct RunOptions {
    pub(crate) workspace: PathBuf,
    pub(crate) mode: Option<ApprovalMode>,
    pub(crate) non_interactive: bool,
    pub(crate) trust: bool,
}

/// One gated run.
pub(crate) struct GateSession {
    executor: GuardedExecutor,
    handler: Option<Arc<CliApprovalHandler>>,
    interrupt_listener: JoinHandle<()>,
}

impl GateSession {
    /// Build the executor for `config` and start listening for Ctrl-C.
    pub(crate) fn start(config: &Config, options: &RunOptions) -> Result<Self> {
        let mode = config_bridge::approval_mode(config, options.mode)?;
        let ctx = Arc::new(RunContext::new(mode));

        let handler = (!options.non_interactive).then(|| Arc::new(CliApprovalHandler::new()));
        let channel = match &handler {
            Some(handler) => ApprovalChannel::interactive(Arc::<CliApprovalHandler>::clone(handler)),
            None => ApprovalChannel::non_interactive(),
        }
        .with_timeout(config_bridge::approval_timeout(config));

        let classifier = RiskClassifier::new(config_bridge::boundary(config, &options.workspace));
        let runner = Arc::new(SystemRunner::with_shell(config.guard.shell.clone()));

        let executor = GuardedExecutor::new(Arc::clone(&ctx), classifier, channel, runner)
            .with_command_timeout(config_bridge::command_timeout(config));

        info!(
            mode = %mode,
            interactive = !options.non_interactive,
            workspace = %options.workspace.display(),
            "Gate session started"
        );

        let interrupt_listener = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                ctx.interrupt();
            }
        });

        Ok(Self {
            executor,
            handler,
            interrupt_listener,
        })
    }

    /// The executor for this run.
    pub(crate) fn executor(&self) -> &GuardedExecutor {
        &self.executor
    }

    /// Wait out a confirmation prompt the gate already gave up on.
    pub(crate) async fn settle_prompt(&self) {
        if let Some(handler) = &self.handler {
            handler.settle().await;
        }
    }
}

impl Drop for GateSession {
    fn drop(&mut self) {
        self.interrupt_listener.abort();
    }
}

/// Make sure the workspace is trusted before anything runs in it.
///
/// Untrusted workspaces are trusted with `--trust`, refused when
/// non-interactive, and otherwise confirmed at the terminal.
pub(crate) fn ensure_trusted(options: &RunOptions) -> Result<()> {
    let home = hybot_home(None)?;
    let mut store = TrustStore::load(&home)?;

    if store.is_trusted(&options.workspace) {
        debug!(workspace = %options.workspace.display(), "workspace already trusted");
        return Ok(());
    }

    if !options.trust {
        if options.non_interactive {
            bail!(
                "workspace {} is not trusted; run `hybot trust` first or pass --trust",
                options.workspace.display()
            );
        }
        if !confirm_trust(&options.workspace)? {
            bail!("workspace not trusted, aborting");
        }
    }

    trust_workspace(&mut store, &options.workspace)
}

/// Record trust and create the workspace config template.
pub(crate) fn trust_workspace(store: &mut TrustStore, workspace: &Path) -> Result<()> {
    if store.add(workspace)? {
        eprintln!(
            "{}",
            Theme::success(&format!("Trusted {}", workspace.display()))
        );
    }
    let config_path = init_workspace(workspace)
        .with_context(|| format!("initializing {}", workspace.display()))?;
    debug!(path = %config_path.display(), "workspace config ready");
    Ok(())
}

fn confirm_trust(workspace: &Path) -> Result<bool> {
    let prompt = format!("Allow hybot to run in {}?", workspace.display());
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact_opt()?;
    Ok(answer.unwrap_or(false))
}
