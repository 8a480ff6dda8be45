//! Tool definition and result types.
//!
//! Defines the schema for tools the model can invoke, the side-effect
//! classification the dispatcher uses for concurrency decisions, and the
//! result/audit types produced by tool execution.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Tool schema
// ─────────────────────────────────────────────────────────────────────────────

/// JSON Schema-compatible parameter definition for a tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolParameterSchema {
    /// Top-level JSON Schema type.
    #[serde(rename = "type")]
    pub schema_type: String,
    /// Property definitions (when type is `object`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    /// Required property names.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Description of the schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Catch-all for additional JSON Schema properties.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ToolParameterSchema {
    /// An object schema with the given properties and required names.
    #[must_use]
    pub fn object(properties: Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            schema_type: "object".into(),
            properties: Some(properties),
            required: Some(required),
            description: None,
            extra: Map::new(),
        }
    }
}

/// A tool definition that can be sent to the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (unique identifier).
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: ToolParameterSchema,
}

// ─────────────────────────────────────────────────────────────────────────────
// Side-effect classification
// ─────────────────────────────────────────────────────────────────────────────

/// Side-effect classification of a tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Pure response — no shared state touched.
    Pure,
    /// Mutates shared state (artifacts, task record).
    Mutating,
    /// Runs a nested agent loop.
    Delegating,
}

/// How calls to a tool may be scheduled within one batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConcurrencyClass {
    /// May run concurrently with other independent calls.
    Independent,
    /// Must run alone, in issue order.
    Exclusive,
}

impl ToolKind {
    /// The scheduling class implied by this side-effect classification.
    #[must_use]
    pub fn concurrency(self) -> ConcurrencyClass {
        match self {
            Self::Pure => ConcurrencyClass::Independent,
            Self::Mutating | Self::Delegating => ConcurrencyClass::Exclusive,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool result
// ─────────────────────────────────────────────────────────────────────────────

/// Result of a tool execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutput {
    /// The tool output content fed back to the model.
    pub content: String,
    /// Optional structured details (tool-specific metadata).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Whether the execution resulted in an error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Create a simple text result.
#[must_use]
pub fn text_result(text: impl Into<String>, is_error: bool) -> ToolOutput {
    ToolOutput {
        content: text.into(),
        details: None,
        is_error: if is_error { Some(true) } else { None },
    }
}

/// Create an error result.
#[must_use]
pub fn error_result(message: impl Into<String>) -> ToolOutput {
    text_result(message, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tool call lifecycle / audit record
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a tool call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallState {
    /// Created from a model instruction, not yet dispatched.
    Initiated,
    /// Handler running.
    Executing,
    /// Finished successfully (terminal).
    Completed,
    /// Finished with an error (terminal).
    Failed,
}

impl ToolCallState {
    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Immutable audit record of a finished tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    /// Tool call ID.
    pub tool_call_id: String,
    /// Tool name.
    pub tool_name: String,
    /// Arguments the call was made with.
    pub arguments: Map<String, Value>,
    /// Terminal lifecycle state.
    pub state: ToolCallState,
    /// Result payload (terminal content, error text for failures).
    pub result: ToolOutput,
    /// Wall-clock execution time.
    pub execution_time_ms: u64,
}
