//! Terminal styling.

use colored::Colorize;
use hybot_guard::{ApprovalPrompt, DenialReason, ExecutionOutcome, RiskLevel};

const BOX_WIDTH: usize = 64;

/// Output helpers shared by every command.
pub(crate) struct Theme;

impl Theme {
    /// Section header.
    pub(crate) fn header(text: &str) -> String {
        format!("{}", text.bold().cyan())
    }

    /// Success line.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {}", "✓".green(), text)
    }

    /// Error line.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Warning line.
    pub(crate) fn warning(text: &str) -> String {
        format!("{} {}", "!".yellow(), text.yellow())
    }

    /// Informational line.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {}", "i".blue(), text)
    }

    /// De-emphasized text.
    pub(crate) fn dimmed(text: &str) -> String {
        format!("{}", text.dimmed())
    }

    /// Colored risk level.
    pub(crate) fn risk_level(level: RiskLevel) -> String {
        match level {
            RiskLevel::Safe => "safe".green().to_string(),
            RiskLevel::Dangerous => "dangerous".red().bold().to_string(),
        }
    }

    /// Box drawn around a pending confirmation.
    pub(crate) fn approval_box(prompt: &ApprovalPrompt) -> String {
        let border = |s: &str| {
            if prompt.matched_rule.is_some() {
                s.red().to_string()
            } else {
                s.yellow().to_string()
            }
        };
        let inner = BOX_WIDTH.saturating_sub(2);
        let pad_line = |label: &str, value: &str| -> String {
            let text = format!("{label:<10}{value}");
            let shown = truncate(&text, BOX_WIDTH.saturating_sub(4));
            let padding = BOX_WIDTH
                .saturating_sub(4)
                .saturating_sub(shown.chars().count());
            format!("{} {shown}{:padding$} {}", border("│"), "", border("│"))
        };

        let title = "Approval required";
        let title_pad = BOX_WIDTH
            .saturating_sub(4)
            .saturating_sub(title.chars().count());

        let mut lines = vec![
            border(&format!("╭{}╮", "─".repeat(inner))),
            format!(
                "{} {}{:title_pad$} {}",
                border("│"),
                title.bold(),
                "",
                border("│")
            ),
            pad_line("Action:", &prompt.summary),
        ];
        if let Some(rule) = &prompt.matched_rule {
            lines.push(pad_line("Rule:", rule));
        }
        lines.push(pad_line("Reason:", &prompt.reason));
        lines.push(border(&format!("╰{}╯", "─".repeat(inner))));
        lines.join("\n")
    }

    /// Render an execution outcome.
    pub(crate) fn outcome(outcome: &ExecutionOutcome) -> String {
        match outcome {
            ExecutionOutcome::Executed { exit_code: 0, .. } => outcome.to_string(),
            ExecutionOutcome::Executed { .. } => format!("{}", outcome.to_string().yellow()),
            ExecutionOutcome::Denied { reason } => Self::denial(*reason),
            ExecutionOutcome::Failed { error } => Self::error(&format!("Operation failed: {error}")),
        }
    }

    fn denial(reason: DenialReason) -> String {
        format!("{} {}", "⊘".red(), format!("Denied: {reason}").red())
    }
}

/// Truncate to `max` characters, marking the cut with `…`.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_outcome_denial_mentions_retry() {
        colored::control::set_override(false);
        let text = Theme::outcome(&ExecutionOutcome::Denied {
            reason: DenialReason::Timeout,
        });
        assert!(text.contains("Do not retry"));
    }
}
