//! POSIX Make-rule dependency file parser.
//!
//! Compilers emit sidecar files mapping an object to the headers it was
//! built from, in Make-rule syntax:
//!
//! ```make
//! main.o: main.c \
//!   include/app.h include/util.h
//! ```
//!
//! The staleness analyzer consumes (never produces) these files. All
//! whitespace-separated paths on a continuation line are taken; escaped
//! spaces in paths (`foo\ bar.h`) are honored.

use std::path::{Path, PathBuf};

/// Parse dependency file contents, returning the dependency paths of every
/// rule in the file. Target names themselves are not returned.
pub fn parse(contents: &str) -> Vec<PathBuf> {
    let mut deps = Vec::new();

    // Join escaped newlines first so a rule is one logical line.
    let joined = contents.replace("\\\r\n", " ").replace("\\\n", " ");

    for line in joined.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Split off the `target:` prefix if present. A colon inside a
        // Windows drive prefix (single letter followed by `:\` or `:/`)
        // is not a rule separator.
        let rest = match find_rule_colon(line) {
            Some(idx) => &line[idx + 1..],
            None => line,
        };

        for token in split_paths(rest) {
            if !token.is_empty() {
                deps.push(PathBuf::from(token));
            }
        }
    }

    deps.dedup();
    deps
}

/// Read and parse a dependency file. A missing or unreadable file yields
/// `None`: the caller falls back to timestamp-only staleness checks.
pub fn load(path: &Path) -> Option<Vec<PathBuf>> {
    let contents = std::fs::read_to_string(path).ok()?;
    Some(parse(&contents))
}

/// Locate the colon separating the rule target from its prerequisites.
fn find_rule_colon(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b':' {
            continue;
        }
        if is_drive_colon(bytes, i) {
            continue;
        }
        return Some(i);
    }
    None
}

/// Whether the colon at `i` is part of a `C:\` / `C:/` drive prefix rather
/// than a rule separator. The letter must start a token, so drive-prefixed
/// paths anywhere on the line are recognized, not just the first.
fn is_drive_colon(bytes: &[u8], i: usize) -> bool {
    if i == 0 || !bytes[i - 1].is_ascii_alphabetic() {
        return false;
    }
    if !matches!(bytes.get(i + 1), Some(b'\\') | Some(b'/')) {
        return false;
    }
    i == 1 || bytes[i - 2].is_ascii_whitespace()
}

/// Split a prerequisite list on unescaped whitespace, unescaping `\ `.
fn split_paths(s: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&' ') => {
                chars.next();
                current.push(' ');
            }
            c if c.is_whitespace() => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}
