//! Post-merge validation.

use crate::error::{ConfigError, ConfigResult};
use crate::types::Config;

/// Upper bound for both timeouts (24 hours).
const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Validate a merged configuration.
///
/// # Errors
///
/// Returns the first invalid field found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_approval(config)?;
    validate_guard(config)?;
    validate_logging(config)?;
    Ok(())
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_owned(),
        message: message.into(),
    }
}

fn validate_approval(config: &Config) -> ConfigResult<()> {
    let a = &config.approval;

    if !matches!(a.mode.as_str(), "always" | "dangerous" | "never") {
        return Err(invalid(
            "approval.mode",
            format!(
                "unsupported mode '{}'; expected one of: always, dangerous, never",
                a.mode
            ),
        ));
    }

    if a.timeout_secs == 0 || a.timeout_secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            "approval.timeout_secs",
            format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
        ));
    }

    Ok(())
}

fn validate_guard(config: &Config) -> ConfigResult<()> {
    let g = &config.guard;

    if g.shell.trim().is_empty() {
        return Err(invalid("guard.shell", "must not be empty"));
    }

    if g.command_timeout_secs == 0 || g.command_timeout_secs > MAX_TIMEOUT_SECS {
        return Err(invalid(
            "guard.command_timeout_secs",
            format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
        ));
    }

    if let Some(empty) = g.protected_paths.iter().position(|p| p.trim().is_empty()) {
        return Err(invalid(
            "guard.protected_paths",
            format!("entry {empty} is empty"),
        ));
    }

    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let l = &config.logging;

    if !matches!(
        l.level.to_ascii_lowercase().as_str(),
        "error" | "warn" | "info" | "debug" | "trace" | "off"
    ) {
        return Err(invalid(
            "logging.level",
            format!("unsupported level '{}'", l.level),
        ));
    }

    if !matches!(l.format.as_str(), "pretty" | "compact" | "json" | "full") {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                l.format
            ),
        ));
    }

    Ok(())
}
