//! Command-line splitting and joining.
//!
//! Callers store commands both as argument vectors and as single shell-like
//! strings; these helpers convert between the two without ever consulting a
//! real shell. Quoting follows POSIX word rules, with no expansion of any
//! kind.

use anyhow::{Context, Result};

/// Split a shell-like command line into an argument vector.
///
/// Single quotes, double quotes, and backslash escapes are honored.
/// Malformed input (an unterminated quote) is an error.
pub fn split(line: &str) -> Result<Vec<String>> {
    shell_words::split(line).with_context(|| format!("malformed command line [{line}]"))
}

/// Join an argument vector into a line a POSIX shell would split back into
/// the same vector.
///
/// Words without special characters stay bare, so simple commands read back
/// exactly as typed.
pub fn join<I, S>(args: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    shell_words::join(args)
}
