//! Quote-aware cutting of a raw command line into simple commands.
//!
//! `shlex` only tokenizes; it does not know that `a;b`, `a&&b`, a newline or
//! a subshell start a new command. This pass finds the unquoted control
//! characters first and lifts command substitutions out so their bodies can
//! be classified on their own.

use std::iter::Peekable;
use std::str::Chars;

/// Stands in for a substitution cut out of its surrounding command.
pub(crate) const SUBSTITUTION_MARKER: &str = "$__substitution";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// A command line cut at unquoted control operators.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Split {
    /// Source text of each simple command, in order. May contain empty pieces.
    pub(crate) chunks: Vec<String>,
    /// Bodies of `$(...)` and backquote substitutions.
    pub(crate) substitutions: Vec<String>,
}

/// Cut `raw` at unquoted `;`, `&`, `|`, newline, `(` and `)`.
///
/// Redirections such as `2>&1`, `&>` and `>|` are kept intact. Returns
/// `None` when a substitution is never closed.
pub(crate) fn split_unquoted(raw: &str) -> Option<Split> {
    let mut split = Split::default();
    let mut current = String::new();
    let mut quote = Quote::None;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::Single, '\'') => {
                quote = Quote::None;
                current.push(c);
            },
            (Quote::Single, _) => current.push(c),
            (_, '\\') => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            },
            (Quote::None, '\'') => {
                quote = Quote::Single;
                current.push(c);
            },
            (Quote::None, '"') => {
                quote = Quote::Double;
                current.push(c);
            },
            (Quote::Double, '"') => {
                quote = Quote::None;
                current.push(c);
            },
            (_, '$') if chars.peek() == Some(&'(') => {
                chars.next();
                split.substitutions.push(take_parenthesized(&mut chars)?);
                current.push_str(SUBSTITUTION_MARKER);
            },
            (_, '`') => {
                split.substitutions.push(take_backquoted(&mut chars)?);
                current.push_str(SUBSTITUTION_MARKER);
            },
            (Quote::None, '&') if current.ends_with(['>', '<']) || chars.peek() == Some(&'>') => {
                current.push(c);
            },
            (Quote::None, '|') if current.ends_with('>') => current.push(c),
            (Quote::None, ';' | '&' | '|' | '\n' | '(' | ')') => {
                split.chunks.push(std::mem::take(&mut current));
            },
            _ => current.push(c),
        }
    }
    split.chunks.push(current);
    Some(split)
}

/// Body of a `$(...)` whose opening has been consumed.
fn take_parenthesized(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut body = String::new();
    let mut depth: usize = 1;
    let mut quote = Quote::None;

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::Single, _) => {},
            (_, '\\') => {
                body.push(c);
                if let Some(escaped) = chars.next() {
                    body.push(escaped);
                }
                continue;
            },
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::None, '(') => depth = depth.saturating_add(1),
            (Quote::None, ')') => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(body);
                }
            },
            _ => {},
        }
        body.push(c);
    }
    None
}

/// Body of a backquote substitution whose opening has been consumed.
fn take_backquoted(chars: &mut Peekable<Chars<'_>>) -> Option<String> {
    let mut body = String::new();
    while let Some(c) = chars.next() {
        match c {
            '`' => return Some(body),
            '\\' => {
                if let Some(escaped) = chars.next() {
                    body.push(escaped);
                }
            },
            _ => body.push(c),
        }
    }
    None
}
