//! Model provider seam.
//!
//! The orchestration core never talks to a language model directly — it
//! consumes this capability: given a system prompt, conversation, and tool
//! schemas, produce either text content or tool-call instructions. Concrete
//! providers (and their retry policies) live outside this crate.

use async_trait::async_trait;
use thiserror::Error;

use foreman_core::messages::{Conversation, Message, ToolCall};
use foreman_core::tools::Tool;

/// One model call's worth of input.
#[derive(Clone, Debug)]
pub struct GenerateRequest {
    /// System prompt for the agent role.
    pub system_prompt: String,
    /// Conversation messages in order.
    pub messages: Vec<Message>,
    /// Tool schemas available to the model.
    pub tools: Vec<Tool>,
}

impl GenerateRequest {
    /// Build a request from a conversation snapshot.
    #[must_use]
    pub fn from_conversation(
        system_prompt: &str,
        conversation: &Conversation,
        tools: Vec<Tool>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.to_owned(),
            messages: conversation.messages().to_vec(),
            tools,
        }
    }
}

/// The model's next action: plain content, tool calls, or both.
#[derive(Clone, Debug, Default)]
pub struct ModelResponse {
    /// Text content (the final answer when no tool calls are present).
    pub content: Option<String>,
    /// Thinking text, if the model produced any.
    pub thinking: Option<String>,
    /// Tool-call instructions.
    pub tool_calls: Vec<ToolCall>,
}

impl ModelResponse {
    /// A plain text response.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    /// A response consisting of tool calls.
    #[must_use]
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }
}

/// Errors from the model capability.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Transient provider/network failure.
    #[error("transient provider error: {message}")]
    Transient {
        /// Description of the failure.
        message: String,
    },

    /// The request itself was rejected.
    #[error("invalid model request: {message}")]
    InvalidRequest {
        /// Description of the rejection.
        message: String,
    },
}

impl ModelError {
    /// Whether a caller-side retry could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Error category string for event emission.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Transient { .. } => "transient",
            Self::InvalidRequest { .. } => "invalid_request",
        }
    }
}

/// The model capability consumed by the run loop.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Model identifier, for logging.
    fn model(&self) -> &str;

    /// Produce the next action for the given conversation.
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelResponse, ModelError>;
}
