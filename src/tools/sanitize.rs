//! Input Sanitization
//!
//! Pure functions that neutralize untrusted request input before it reaches
//! the process launcher or the filesystem.
//!
//! Sanitization is a second line of defense. The primary control is that
//! every command is launched as a discrete argument vector, never through a
//! shell, so the characters removed here could not be interpreted anyway.
//! The denylist for free-form tokens does not cover globbing, whitespace or
//! newlines; identifiers use a strict allow-list character class instead.

use std::path::{Component, Path, PathBuf};

/// Shell metacharacters removed from free-form tokens
///
/// - `;` : Command separator
/// - `&` : Background execution
/// - `|` : Pipe
/// - `` ` `` : Command substitution
/// - `$` : Variable expansion
/// - `<` `>` : Redirection
pub const SHELL_METACHARACTERS: &[char] = &[';', '&', '|', '`', '$', '<', '>'];

/// Strip surrounding whitespace and every shell metacharacter from `text`.
///
/// Characters are removed wherever they occur, not only at the edges, and
/// the result never contains any of [`SHELL_METACHARACTERS`].
///
/// # Example
///
/// ```
/// use cipherbot_gateway::tools::sanitize_shell_token;
///
/// assert_eq!(sanitize_shell_token("  example.com; rm -rf / "), "example.com rm -rf /");
/// ```
pub fn sanitize_shell_token(text: &str) -> String {
    text.trim()
        .chars()
        .filter(|c| !SHELL_METACHARACTERS.contains(c))
        .collect()
}

/// Normalize a user-supplied path into one that is guaranteed to be relative.
///
/// `.` segments and redundant separators are dropped and `..` pops the
/// previous segment. The path is normalized as if it were rooted, so a `..`
/// with nothing left to pop is discarded rather than kept; this happens
/// before any leading separator is removed, so traversal cannot survive into
/// a later join. An input that normalizes to nothing becomes `.`.
///
/// Existence and file type are not checked.
///
/// ```
/// use cipherbot_gateway::tools::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("../../etc/passwd"), PathBuf::from("etc/passwd"));
/// assert_eq!(sanitize_path("/etc/passwd"), PathBuf::from("etc/passwd"));
/// ```
pub fn sanitize_path(path: &str) -> PathBuf {
    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(path).components() {
        match component {
            Component::Normal(segment) => segments.push(segment),
            Component::ParentDir => {
                segments.pop();
            }
            // Roots, prefixes and `.` carry no segment of their own.
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }

    if segments.is_empty() {
        return PathBuf::from(".");
    }
    segments.into_iter().collect()
}

/// Restrict a package or tool identifier to `[A-Za-z0-9._-]`.
///
/// The input is trimmed and every other character is dropped, so the result
/// is always safe to pass as a single argument token. Word boundaries are not
/// preserved: `"curl; rm -rf /"` becomes `"curlrm-rf"`.
pub fn sanitize_identifier_token(name: &str) -> String {
    name.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect()
}

/// Split a raw argument string on whitespace and sanitize each token.
///
/// Tokens that sanitize to nothing (for example a lone `;`) are dropped so
/// they never reach the process as empty arguments.
pub fn split_arguments(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(sanitize_shell_token)
        .filter(|token| !token.is_empty())
        .collect()
}
