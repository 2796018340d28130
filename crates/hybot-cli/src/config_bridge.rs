//! Bridge from `hybot_config::Config` to domain types.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use hybot_config::Config;
use hybot_guard::{ApprovalMode, WorkspaceBoundary};
use hybot_telemetry::{FileRotation, LogConfig, LogFormat};

/// Logging settings from the `logging:` section, raised by `-v` flags.
pub(crate) fn to_log_config(config: &Config, verbose: u8) -> LogConfig {
    let mut log = if verbose > 0 {
        LogConfig::from_verbosity(verbose)
    } else {
        LogConfig::new(config.logging.level.clone())
    };
    log = log.with_format(config.logging.format.parse().unwrap_or(LogFormat::Compact));
    if let Some(dir) = &config.logging.directory {
        log = log.with_file_logging(dir.clone(), FileRotation::Daily);
    }
    log
}

/// The approval mode: `--mode` wins over `approval.mode`.
pub(crate) fn approval_mode(config: &Config, flag: Option<ApprovalMode>) -> Result<ApprovalMode> {
    if let Some(mode) = flag {
        return Ok(mode);
    }
    config
        .approval
        .mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid approval.mode")
}

/// Workspace boundary with the configured protected globs.
pub(crate) fn boundary(config: &Config, workspace: &Path) -> WorkspaceBoundary {
    WorkspaceBoundary::with_protected_patterns(workspace, config.guard.protected_paths.clone())
}

/// `approval.timeout_secs`.
pub(crate) fn approval_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.approval.timeout_secs)
}

/// `guard.command_timeout_secs`.
pub(crate) fn command_timeout(config: &Config) -> Duration {
    Duration::from_secs(config.guard.command_timeout_secs)
}
