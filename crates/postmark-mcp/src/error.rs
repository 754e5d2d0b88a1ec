//! Error taxonomy for tool invocations.
//!
//! [`ValidationError`] rejects an invocation before any side effect and is
//! reported to the client as a malformed call. [`ToolError`] covers failures
//! after validation and becomes an error-shaped tool result.

use std::path::PathBuf;
use thiserror::Error;

use crate::provider::ProviderError;

/// Malformed or contradictory tool input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required field `{field}` for {tool}")]
    MissingField { tool: &'static str, field: String },

    /// Wrong JSON type or otherwise undecodable arguments.
    #[error("Invalid {tool} arguments: {message}")]
    InvalidType { tool: &'static str, message: String },

    #[error("Invalid email address in `{field}`: {value:?}")]
    InvalidEmail { field: &'static str, value: String },

    #[error("Invalid date in `{field}`: expected YYYY-MM-DD, got {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("Invalid attachment filePath {value:?}: must be an absolute path")]
    InvalidPath { value: String },

    /// Arguments are individually well-formed but contradict each other.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// An attachment source that could not be read.
#[derive(Debug, Error)]
#[error("Failed to read attachment {path}: {source}")]
pub struct AttachmentReadError {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// Failure past validation; the invocation ran and reports an error result.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Attachment(#[from] AttachmentReadError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}
