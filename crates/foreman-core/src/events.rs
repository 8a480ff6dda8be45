//! Event types for agent orchestration.
//!
//! [`AgentEvent`] is the only channel through which the orchestration core's
//! internal state becomes visible externally. Events are write-once, ordered
//! by emission time within a task, and broadcast to per-task subscribers.
//!
//! Every agent status transition, every tool-call lifecycle transition, and
//! every dialogue append produces exactly one event.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::status::{AgentStatus, TaskStatus};
use crate::tools::ToolOutput;

// ─────────────────────────────────────────────────────────────────────────────
// Base event
// ─────────────────────────────────────────────────────────────────────────────

/// Common fields for all events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseEvent {
    /// Task this event belongs to.
    pub task_id: String,
    /// Agent that produced the event.
    pub agent_id: String,
    /// ISO 8601 timestamp.
    pub timestamp: String,
}

impl BaseEvent {
    /// Create a new base event with the current UTC timestamp.
    #[must_use]
    pub fn now(task_id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload support types
// ─────────────────────────────────────────────────────────────────────────────

/// Direction of a dialogue entry relative to the agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Content flowing into the agent (user prompt, resume answer).
    Input,
    /// Content produced by the agent.
    Output,
}

/// Rendering hint for dialogue content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    /// Plain text.
    Text,
    /// Source code.
    Code,
    /// Structured JSON.
    Json,
    /// Chart data.
    Chart,
}

/// Typed content carried by a dialogue event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DialogueContent {
    /// Rendering hint.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// The content payload.
    pub data: Value,
}

impl DialogueContent {
    /// Plain text content.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            data: Value::String(text.into()),
        }
    }

    /// Structured JSON content.
    #[must_use]
    pub fn json(data: Value) -> Self {
        Self {
            kind: ContentKind::Json,
            data,
        }
    }
}

/// Phase of a streamed block (thinking or content).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// Block opened.
    Started,
    /// Incremental fragment.
    Chunk,
    /// Block closed.
    Complete,
}

/// What kind of human input is being requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalKind {
    /// A clarifying question the run is suspended on.
    Question,
}

// ─────────────────────────────────────────────────────────────────────────────
// agent_events! macro — generates AgentEvent enum, base(), event_type()
// ─────────────────────────────────────────────────────────────────────────────

/// Declarative macro that generates [`AgentEvent`], its `base()` and
/// `event_type()` accessors, and a compile-time `VARIANT_COUNT`.
///
/// Adding a new variant requires ONE edit (inside this invocation).
/// The compiler enforces exhaustive matching everywhere else.
macro_rules! agent_events {
    ($(
        $(#[doc = $doc:literal])*
        $variant:ident {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $ty:ty
            ),*
            $(,)?
        } => $rename:literal
    ),* $(,)?) => {
        /// An orchestration event with task/agent context.
        ///
        /// Events are broadcast to connected observers; clients rely on the
        /// exact type strings and field names.
        #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
        #[serde(tag = "type")]
        #[allow(missing_docs)]
        pub enum AgentEvent {
            $(
                $(#[doc = $doc])*
                #[serde(rename = $rename)]
                $variant {
                    #[serde(flatten)]
                    base: BaseEvent,
                    $(
                        $(#[$fmeta])*
                        $field: $ty,
                    )*
                },
            )*
        }

        impl AgentEvent {
            /// Get the base event fields.
            #[must_use]
            pub fn base(&self) -> &BaseEvent {
                match self {
                    $(Self::$variant { base, .. } => base,)*
                }
            }

            /// Get the event type string (for type discrimination).
            #[must_use]
            pub fn event_type(&self) -> &str {
                match self {
                    $(Self::$variant { .. } => $rename,)*
                }
            }
        }

        /// Number of `AgentEvent` variants (compile-time constant for tests).
        #[cfg(test)]
        pub(crate) const VARIANT_COUNT: usize = [$($rename),*].len();
    };
}

agent_events! {
    // -- Agent lifecycle --

    /// Agent status transition.
    AgentStatusChanged {
        #[serde(rename = "oldStatus")]
        old_status: AgentStatus,
        #[serde(rename = "newStatus")]
        new_status: AgentStatus,
    } => "agent_status_changed",

    // -- Dialogue --

    /// A dialogue entry was appended.
    DialogueUpdate {
        direction: Direction,
        content: DialogueContent,
        sender: String,
    } => "dialogue_update",

    // -- Tool call lifecycle --

    /// Tool call created from a model instruction.
    ToolCallInitiated {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        arguments: Map<String, Value>,
    } => "tool_call_initiated",

    /// Tool handler is running.
    ToolCallExecuting {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
    } => "tool_call_executing",

    /// Tool call finished successfully.
    ToolCallCompleted {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        result: ToolOutput,
        #[serde(rename = "executionTimeMs")]
        execution_time_ms: u64,
    } => "tool_call_completed",

    /// Tool call failed; the error text is fed back to the model.
    ToolCallFailed {
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        #[serde(rename = "toolName")]
        tool_name: String,
        error: String,
        #[serde(rename = "executionTimeMs")]
        execution_time_ms: u64,
    } => "tool_call_failed",

    // -- Streaming --

    /// Thinking block progress.
    ThinkingUpdate {
        status: StreamStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    } => "thinking_update",

    /// Final-answer content progress.
    ContentStream {
        status: StreamStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(rename = "fullContent", skip_serializing_if = "Option::is_none")]
        full_content: Option<String>,
    } => "content_stream",

    // -- Human in the loop --

    /// Run suspended awaiting a human answer.
    ApprovalRequired {
        kind: ApprovalKind,
        prompt: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        options: Option<Vec<String>>,
    } => "approval_required",

    // -- Task lifecycle --

    /// Task status transition.
    TaskStatusChanged {
        #[serde(rename = "oldStatus")]
        old_status: TaskStatus,
        #[serde(rename = "newStatus")]
        new_status: TaskStatus,
    } => "task_status_changed",

    /// Task finished with a final answer.
    TaskCompleted {
        #[serde(rename = "finalContent")]
        final_content: String,
    } => "task_completed",

    /// Task ended by an unrecoverable error.
    TaskFailed {
        error: String,
    } => "task_failed",

    // -- Delegation --

    /// A sub-agent run loop was started by a delegation tool call.
    SubagentSpawned {
        #[serde(rename = "subagentId")]
        subagent_id: String,
        #[serde(rename = "subagentType")]
        subagent_type: String,
        description: String,
    } => "subagent_spawned",

    /// A sub-agent run loop ended.
    SubagentCompleted {
        #[serde(rename = "subagentId")]
        subagent_id: String,
        #[serde(rename = "subagentType")]
        subagent_type: String,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
        turns: u32,
    } => "subagent_completed",
}

// ─────────────────────────────────────────────────────────────────────────────
// Constructors
// ─────────────────────────────────────────────────────────────────────────────

/// Build an `agent_status_changed` event.
#[must_use]
pub fn agent_status_event(
    task_id: &str,
    agent_id: &str,
    old_status: AgentStatus,
    new_status: AgentStatus,
) -> AgentEvent {
    AgentEvent::AgentStatusChanged {
        base: BaseEvent::now(task_id, agent_id),
        old_status,
        new_status,
    }
}

/// Build a `dialogue_update` event.
#[must_use]
pub fn dialogue_event(
    task_id: &str,
    agent_id: &str,
    direction: Direction,
    content: DialogueContent,
    sender: impl Into<String>,
) -> AgentEvent {
    AgentEvent::DialogueUpdate {
        base: BaseEvent::now(task_id, agent_id),
        direction,
        content,
        sender: sender.into(),
    }
}

/// Build an `approval_required` event for a pending question.
#[must_use]
pub fn approval_event(
    task_id: &str,
    agent_id: &str,
    prompt: impl Into<String>,
    options: Option<Vec<String>>,
) -> AgentEvent {
    AgentEvent::ApprovalRequired {
        base: BaseEvent::now(task_id, agent_id),
        kind: ApprovalKind::Question,
        prompt: prompt.into(),
        options,
    }
}
