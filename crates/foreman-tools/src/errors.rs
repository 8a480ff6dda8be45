//! Tool error types.
//!
//! Unified error enum for tool execution failures. An `Err` from a tool body
//! never escapes the dispatcher as a process-level fault — it becomes a
//! `failed` tool result fed back to the model.

use thiserror::Error;

/// Errors that can occur during tool execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Parameter validation failed.
    #[error("validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Operation was cancelled.
    #[error("cancelled")]
    Cancelled,

    /// A delegated sub-agent run failed.
    #[error("delegation failed: {message}")]
    Delegation {
        /// Description of the delegation failure.
        message: String,
    },

    /// Internal error (catch-all).
    #[error("{message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}
