//! `hybot shell`: an interactive loop of gated shell commands.
//!
//! Every line is one turn in a single run, so remembered decisions carry
//! over from line to line until the shell exits.

use std::path::PathBuf;

use anyhow::Result;
use hybot_config::{Config, hybot_home};
use hybot_guard::Operation;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use rustyline::history::History;
use tracing::{debug, warn};

use crate::commands::operate::print_outcome;
use crate::session::{GateSession, RunOptions, ensure_trusted};
use crate::theme::Theme;

const HISTORY_FILE: &str = "history";

/// A parsed input line.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Help,
    ShowMemory,
    Forget,
    Command(&'a str),
}

fn parse_line(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "exit" | "quit" | ":q" => Input::Exit,
        ":help" => Input::Help,
        ":memory" => Input::ShowMemory,
        ":forget" => Input::Forget,
        command => Input::Command(command),
    }
}

fn record_history(history: &mut impl History, command: &str) {
    if let Err(e) = history.add(command) {
        debug!(error = %e, "could not record shell history");
    }
}

/// Run the loop until EOF or `exit`.
pub(crate) async fn run_shell(config: &Config, options: &RunOptions) -> Result<()> {
    ensure_trusted(options)?;
    let session = GateSession::start(config, options)?;
    let ctx = session.executor().context();

    let mut editor = DefaultEditor::new()?;
    let history = history_path();
    if let Some(path) = &history
        && editor.load_history(path).is_err()
    {
        debug!(path = %path.display(), "no shell history yet");
    }

    println!(
        "{}",
        Theme::header(&format!(
            "hybot shell in {} (mode: {})",
            options.workspace.display(),
            ctx.mode()
        ))
    );
    println!("{}", Theme::dimmed("Type :help for commands, Ctrl-D to quit."));

    loop {
        session.settle_prompt().await;
        let line = match editor.readline("hybot> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse_line(&line) {
            Input::Empty => {},
            Input::Exit => break,
            Input::Help => print_help(),
            Input::ShowMemory => {
                let remembered = ctx.memory().snapshot();
                if remembered.is_empty() {
                    println!("{}", Theme::info("Nothing remembered this session"));
                }
                for (rule_class, outcome) in remembered {
                    println!("  {rule_class:<32} {outcome}");
                }
            },
            Input::Forget => {
                ctx.memory().clear();
                println!("{}", Theme::success("Session decisions cleared"));
            },
            Input::Command(command) => {
                record_history(editor.history_mut(), command);
                ctx.begin_turn();
                let outcome = session.executor().execute(&Operation::shell(command)).await?;
                print_outcome(&outcome);
            },
        }
    }

    if let Some(path) = &history
        && let Err(e) = editor.save_history(path)
    {
        warn!(path = %path.display(), error = %e, "could not save shell history");
    }
    Ok(())
}

fn history_path() -> Option<PathBuf> {
    let home = hybot_home(None).ok()?;
    std::fs::create_dir_all(&home).ok()?;
    Some(home.join(HISTORY_FILE))
}

fn print_help() {
    println!("{}", Theme::header("Shell commands"));
    println!("  <command>   run a command through the gate");
    println!("  :memory     list decisions remembered this session");
    println!("  :forget     clear remembered decisions");
    println!("  exit        leave the shell");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("   "), Input::Empty);
        assert_eq!(parse_line("exit"), Input::Exit);
        assert_eq!(parse_line(" :memory "), Input::ShowMemory);
        assert_eq!(parse_line(":forget"), Input::Forget);
        assert_eq!(parse_line("ls -la  "), Input::Command("ls -la"));
    }

    #[test]
    fn test_record_history() {
        let mut history = rustyline::history::MemHistory::new();
        record_history(&mut history, "git status");
        record_history(&mut history, "cargo test");
        assert_eq!(history.len(), 2);
    }
}
