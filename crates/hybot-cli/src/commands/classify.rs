//! `hybot classify`: show how a command would be judged without running it.

use std::process::ExitCode;

use anyhow::Result;
use hybot_guard::{ApprovalMode, RiskVerdict, classify_command, requires_confirmation};

use crate::theme::Theme;

/// Classify `command` and print the verdict.
///
/// Exits 0 for safe commands and 2 for dangerous ones so scripts can branch
/// on the result.
pub(crate) fn run_classify(command: &str, mode: ApprovalMode, json: bool) -> Result<ExitCode> {
    let verdict = classify_command(command);
    let confirm = requires_confirmation(&verdict, mode);

    if json {
        let value = serde_json::json!({
            "command": command,
            "verdict": verdict,
            "mode": mode,
            "requires_confirmation": confirm,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_verdict(command, &verdict, mode, confirm);
    }

    Ok(if verdict.is_dangerous() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

fn print_verdict(command: &str, verdict: &RiskVerdict, mode: ApprovalMode, confirm: bool) {
    println!("{}", Theme::header("Classification"));
    println!("  Command: {command}");
    println!("  Risk:    {}", Theme::risk_level(verdict.level));
    if let Some(rule) = &verdict.matched_rule {
        println!("  Rule:    {rule}");
    }
    println!("  Reason:  {}", verdict.reason);
    let gate = if confirm {
        Theme::warning(&format!("confirmation required in `{mode}` mode"))
    } else {
        Theme::dimmed(&format!("runs without confirmation in `{mode}` mode"))
    };
    println!("  {gate}");
}
