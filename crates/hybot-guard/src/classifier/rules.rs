//! The dangerous-command rule table.
//!
//! Rules are plain data: an id, a reason, and a predicate over the parsed
//! command line. Order matters, the first matching rule names the verdict.

use regex::Regex;
use std::sync::LazyLock;

use super::split::split_unquoted;

/// Commands that run their arguments as another command.
const WRAPPERS: &[&str] = &["env", "command", "nohup", "time", "exec", "xargs"];

/// Reserved words that may precede the program of a simple command.
const KEYWORDS: &[&str] = &["!", "{", "}", "if", "then", "else", "elif", "while", "until", "do"];

/// Shells whose `-c` argument is itself a command line.
const SHELLS: &[&str] = &["sh", "bash", "zsh", "dash", "ksh", "fish"];

/// How deep `sh -c`, `eval` and substitutions are followed.
const MAX_NESTING: usize = 8;

/// Device files that are harmless redirect targets.
const SAFE_DEVICES: &[&str] = &["null", "stdout", "stderr", "stdin", "tty", "zero"];

static DEVICE_REDIRECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r">{1,2}\|?\s*/dev/([A-Za-z0-9_./-]+)").expect("invalid device redirect regex")
});

static REMOTE_SCRIPT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:ba|z|da|k)?sh\b")
        .expect("invalid remote script regex")
});

/// One simple command: program basename plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
}

/// A tokenized command line.
#[derive(Debug)]
pub(crate) struct CommandLine<'a> {
    pub(crate) raw: &'a str,
    pub(crate) segments: Vec<Segment>,
}

impl<'a> CommandLine<'a> {
    /// Split at unquoted control operators, then tokenize each simple
    /// command with POSIX quoting rules.
    ///
    /// Command substitutions, `sh -c` scripts and `eval` arguments are
    /// parsed as nested command lines and contribute their own segments.
    ///
    /// Returns `None` for malformed quoting, an unclosed substitution, a
    /// program name only known at run time (`$CMD args`), nesting deeper
    /// than the limit, or when there is no command.
    pub(crate) fn parse(raw: &'a str) -> Option<Self> {
        let mut segments = Vec::new();
        collect_segments(raw, 0, &mut segments)?;
        if segments.is_empty() {
            return None;
        }
        Some(Self { raw, segments })
    }

    fn any_segment(&self, pred: impl Fn(&Segment) -> bool) -> bool {
        self.segments.iter().any(pred)
    }
}

fn collect_segments(source: &str, depth: usize, out: &mut Vec<Segment>) -> Option<()> {
    if depth > MAX_NESTING {
        return None;
    }
    let nested = depth.saturating_add(1);
    let split = split_unquoted(source)?;

    for body in &split.substitutions {
        collect_segments(body, nested, out)?;
    }
    for chunk in &split.chunks {
        let Some(segment) = build_segment(shlex::split(chunk)?) else {
            continue;
        };
        if segment.program.starts_with('$') {
            return None;
        }
        if let Some(script) = inline_script(&segment) {
            collect_segments(&script, nested, out)?;
        }
        out.push(segment);
    }
    Some(())
}

/// The command line a segment hands to another shell, if any.
fn inline_script(seg: &Segment) -> Option<String> {
    if seg.program == "eval" {
        return Some(seg.args.join(" "));
    }
    if SHELLS.contains(&seg.program.as_str()) && has_short_flag(&seg.args, 'c') {
        return operands(&seg.args).next().cloned();
    }
    None
}

fn build_segment(tokens: Vec<String>) -> Option<Segment> {
    let mut iter = tokens
        .into_iter()
        .skip_while(|t| is_assignment(t) || KEYWORDS.contains(&t.as_str()))
        .peekable();

    // Unwrap `env FOO=1 nohup sudo ...` down to the real program.
    while let Some(first) = iter.peek() {
        if !WRAPPERS.contains(&basename(first)) {
            break;
        }
        iter.next();
        while iter
            .peek()
            .is_some_and(|t| t.starts_with('-') || is_assignment(t))
        {
            iter.next();
        }
    }

    let program = iter.next()?;
    Some(Segment {
        program: basename(&program).to_string(),
        args: iter.collect(),
    })
}

fn is_assignment(token: &str) -> bool {
    token.split_once('=').is_some_and(|(name, _)| {
        !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    })
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

/// Short-option cluster (`-rf`) containing `flag`.
fn has_short_flag(args: &[String], flag: char) -> bool {
    args.iter().any(|a| {
        a.strip_prefix('-')
            .is_some_and(|rest| !rest.starts_with('-') && rest.contains(flag))
    })
}

fn has_arg(args: &[String], wanted: &[&str]) -> bool {
    args.iter().any(|a| wanted.contains(&a.as_str()))
}

/// Non-option operands, honoring `--`.
fn operands(args: &[String]) -> impl Iterator<Item = &String> {
    let mut after_dashes = false;
    args.iter().filter(move |a| {
        if after_dashes {
            return true;
        }
        if a.as_str() == "--" {
            after_dashes = true;
            return false;
        }
        !a.starts_with('-')
    })
}

/// Git subcommand and its arguments, skipping global options.
fn git_subcommand(seg: &Segment) -> Option<(&str, &[String])> {
    if seg.program != "git" {
        return None;
    }
    let mut iter = seg.args.iter().enumerate();
    while let Some((idx, arg)) = iter.next() {
        match arg.as_str() {
            "-C" | "-c" | "--git-dir" | "--work-tree" | "--namespace" => {
                iter.next();
            },
            a if a.starts_with('-') => {},
            _ => {
                let (sub, rest) = seg.args.get(idx..)?.split_first()?;
                return Some((sub.as_str(), rest));
            },
        }
    }
    None
}

fn is_world_writable_mode(mode: &str) -> bool {
    if !mode.is_empty() && mode.len() <= 4 && mode.chars().all(|c| ('0'..='7').contains(&c)) {
        return mode
            .chars()
            .last()
            .and_then(|c| c.to_digit(8))
            .is_some_and(|others| others & 2 != 0);
    }
    mode.split(',').any(|clause| {
        clause
            .split_once(['+', '='])
            .is_some_and(|(who, perms)| (who.contains('a') || who.contains('o')) && perms.contains('w'))
    })
}

/// A rule in the classification table.
pub(crate) struct Rule {
    /// Stable id, used as the rule class for session memory.
    pub(crate) id: &'static str,
    /// Shown to the human when confirmation is requested.
    pub(crate) reason: &'static str,
    /// Predicate over the parsed command line.
    pub(crate) matches: fn(&CommandLine<'_>) -> bool,
}

/// Ordered rule table. First match wins.
pub(crate) const RULES: &[Rule] = &[
    Rule {
        id: "privilege-escalation",
        reason: "runs a command with elevated privileges",
        matches: privilege_escalation,
    },
    Rule {
        id: "recursive-force-delete",
        reason: "recursively or forcibly deletes files",
        matches: recursive_force_delete,
    },
    Rule {
        id: "root-path-delete",
        reason: "deletes files addressed by an absolute or home path",
        matches: root_path_delete,
    },
    Rule {
        id: "find-delete",
        reason: "deletes every file matched by find",
        matches: find_delete,
    },
    Rule {
        id: "secure-erase",
        reason: "irrecoverably overwrites files",
        matches: secure_erase,
    },
    Rule {
        id: "open-permissions",
        reason: "makes files world-writable",
        matches: open_permissions,
    },
    Rule {
        id: "recursive-permission-change",
        reason: "recursively changes permissions or ownership",
        matches: recursive_permission_change,
    },
    Rule {
        id: "ownership-change",
        reason: "changes file ownership",
        matches: ownership_change,
    },
    Rule {
        id: "raw-disk-write",
        reason: "copies raw blocks with dd",
        matches: raw_disk_write,
    },
    Rule {
        id: "filesystem-format",
        reason: "formats or repartitions a disk",
        matches: filesystem_format,
    },
    Rule {
        id: "system-power",
        reason: "shuts down or reboots the machine",
        matches: system_power,
    },
    Rule {
        id: "git-force-push",
        reason: "force-pushes and may overwrite remote history",
        matches: git_force_push,
    },
    Rule {
        id: "git-hard-reset",
        reason: "discards uncommitted changes with git reset --hard",
        matches: git_hard_reset,
    },
    Rule {
        id: "git-force-clean",
        reason: "deletes untracked files with git clean",
        matches: git_force_clean,
    },
    Rule {
        id: "force-kill",
        reason: "forcibly kills processes",
        matches: force_kill,
    },
    Rule {
        id: "device-redirect",
        reason: "redirects output into a device file",
        matches: device_redirect,
    },
    Rule {
        id: "remote-script-exec",
        reason: "pipes a downloaded script into a shell",
        matches: remote_script_exec,
    },
];

fn privilege_escalation(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| matches!(s.program.as_str(), "sudo" | "doas" | "su" | "pkexec"))
}

fn recursive_force_delete(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        s.program == "rm"
            && (has_short_flag(&s.args, 'r')
                || has_short_flag(&s.args, 'R')
                || has_short_flag(&s.args, 'f')
                || has_arg(&s.args, &["--recursive", "--force"]))
            && operands(&s.args).next().is_some()
    })
}

fn root_path_delete(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        s.program == "rm" && operands(&s.args).any(|p| p.starts_with('/') || p.starts_with('~'))
    })
}

fn find_delete(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        s.program == "find"
            && (has_arg(&s.args, &["-delete"])
                || s.args.windows(2).any(|w| {
                    matches!(w[0].as_str(), "-exec" | "-execdir" | "-ok" | "-okdir")
                        && basename(&w[1]) == "rm"
                }))
    })
}

fn secure_erase(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| s.program == "shred")
}

fn open_permissions(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        s.program == "chmod" && operands(&s.args).any(|a| is_world_writable_mode(a))
    })
}

fn recursive_permission_change(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        matches!(s.program.as_str(), "chmod" | "chown" | "chgrp")
            && (has_short_flag(&s.args, 'R') || has_arg(&s.args, &["--recursive"]))
    })
}

fn ownership_change(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| matches!(s.program.as_str(), "chown" | "chgrp"))
}

fn raw_disk_write(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| s.program == "dd")
}

fn filesystem_format(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        s.program == "mkfs"
            || s.program.starts_with("mkfs.")
            || matches!(
                s.program.as_str(),
                "fdisk" | "sfdisk" | "parted" | "wipefs" | "format"
            )
    })
}

fn system_power(line: &CommandLine<'_>) -> bool {
    const POWER: &[&str] = &["shutdown", "reboot", "poweroff", "halt"];
    line.any_segment(|s| {
        POWER.contains(&s.program.as_str())
            || (s.program == "systemctl" && has_arg(&s.args, POWER))
    })
}

fn git_force_push(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        git_subcommand(s).is_some_and(|(sub, args)| {
            sub == "push"
                && (has_arg(args, &["--force", "-f", "--force-with-lease"])
                    || args.iter().any(|a| a.starts_with("--force-with-lease=")))
        })
    })
}

fn git_hard_reset(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        git_subcommand(s).is_some_and(|(sub, args)| sub == "reset" && has_arg(args, &["--hard"]))
    })
}

fn git_force_clean(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| {
        git_subcommand(s).is_some_and(|(sub, args)| {
            sub == "clean" && (has_short_flag(args, 'f') || has_arg(args, &["--force"]))
        })
    })
}

fn force_kill(line: &CommandLine<'_>) -> bool {
    line.any_segment(|s| match s.program.as_str() {
        "killall" | "pkill" => true,
        "kill" => {
            has_arg(&s.args, &["-9", "-KILL", "-SIGKILL"])
                || s.args
                    .windows(2)
                    .any(|w| w[0] == "-s" && matches!(w[1].as_str(), "9" | "KILL" | "SIGKILL"))
        },
        _ => false,
    })
}

fn device_redirect(line: &CommandLine<'_>) -> bool {
    DEVICE_REDIRECT.captures_iter(line.raw).any(|caps| {
        caps.get(1).is_some_and(|device| {
            let name = device.as_str();
            !SAFE_DEVICES.contains(&name) && !name.starts_with("fd/")
        })
    })
}

fn remote_script_exec(line: &CommandLine<'_>) -> bool {
    REMOTE_SCRIPT.is_match(line.raw)
}
