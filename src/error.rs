//! Gateway error taxonomy
//!
//! Every failure an operation can hit falls into one of three families. The
//! `Display` text of each variant is exactly what the caller receives, so no
//! failure ever needs to escape an operation as an unhandled fault.

use crate::tools::ExecutionFailure;
use std::io;
use thiserror::Error;

/// Any failure produced by a gateway operation
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Rejected before anything was executed
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Filesystem Bridge failure
    #[error(transparent)]
    Filesystem(#[from] FsError),

    /// The process timed out or could not be launched
    #[error(transparent)]
    Execution(#[from] ExecutionFailure),
}

/// Request input that failed validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was absent or blank
    #[error("Error: {what} is required")]
    Missing { what: &'static str },

    /// A field sanitized to nothing
    #[error("Error: Invalid {what}")]
    Invalid { what: &'static str },

    /// Writes with no content are refused
    #[error("Error: Content cannot be empty")]
    EmptyContent,

    /// The tool is not on the allow-list
    #[error(
        "Error: Tool '{tool}' is not in the approved list. Allowed tools: {}\n\nTip: Use 'search_tool' to find and 'install_tool' to add new tools.",
        .allowed.join(", ")
    )]
    NotPermitted { tool: String, allowed: Vec<String> },
}

/// Filesystem Bridge failure, one variant per distinct message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("Error: {kind} not found: {path}")]
    NotFound { kind: &'static str, path: String },

    #[error("Error: Not a file: {path}")]
    NotAFile { path: String },

    #[error("Error: Not a directory: {path}")]
    NotADirectory { path: String },

    #[error("Error: File is not executable: {path}")]
    NotExecutable { path: String },

    #[error("Error: Permission denied: {path}")]
    PermissionDenied { path: String },

    #[error("Error: File appears to be binary. Cannot read as text: {path}")]
    Binary { path: String },

    /// The path resolves to the root directory itself
    #[error("Error: Refusing to delete the filesystem root: {path}")]
    RootDeletion { path: String },

    /// Any other I/O error, tagged with what was being attempted
    #[error("Error {action}: {message}")]
    Io {
        action: &'static str,
        message: String,
    },
}

impl FsError {
    /// Map an I/O error, keeping permission failures distinct
    pub fn from_io(action: &'static str, path: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_string(),
            },
            _ => Self::Io {
                action,
                message: err.to_string(),
            },
        }
    }
}
