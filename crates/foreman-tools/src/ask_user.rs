//! `ask_user` tool — clarifying questions for a human.
//!
//! In [`AskBehavior::Suspend`] mode this is the one interactive,
//! turn-stopping tool in the system: dispatching it suspends the run loop
//! until a matching resume supplies the answer. In
//! [`AskBehavior::Passthrough`] mode (handed to sub-agents when granted)
//! the same tool answers immediately that no human is reachable, so nested
//! loops never suspend. The behavior is fixed at construction — there is no
//! global toggle.

use async_trait::async_trait;
use serde_json::{Value, json};

use foreman_core::tools::{Tool, ToolKind, ToolOutput, ToolParameterSchema, text_result};

use crate::errors::ToolError;
use crate::params::{optional_str_array, require_str};
use crate::traits::{AgentTool, ToolContext};

/// What dispatching the tool does to the owning run loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AskBehavior {
    /// Suspend the run loop and wait for a human answer.
    Suspend,
    /// Answer immediately; never suspends (sub-agent variant).
    Passthrough,
}

/// The `ask_user` tool presents a clarifying question to a human.
pub struct AskUserTool {
    behavior: AskBehavior,
}

impl AskUserTool {
    /// Create the tool with the given behavior.
    #[must_use]
    pub fn new(behavior: AskBehavior) -> Self {
        Self { behavior }
    }

    /// The suspending variant used by supervisors.
    #[must_use]
    pub fn interactive() -> Self {
        Self::new(AskBehavior::Suspend)
    }

    /// The non-suspending variant for sub-agents.
    #[must_use]
    pub fn passthrough() -> Self {
        Self::new(AskBehavior::Passthrough)
    }
}

#[async_trait]
impl AgentTool for AskUserTool {
    fn name(&self) -> &str {
        "ask_user"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Pure
    }

    fn is_interactive(&self) -> bool {
        self.behavior == AskBehavior::Suspend
    }

    fn stops_turn(&self) -> bool {
        self.behavior == AskBehavior::Suspend
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "ask_user".into(),
            description: "Ask the human operator a clarifying question and wait for their \
answer. Use this only when you cannot proceed without input — the task stays \
suspended until the operator responds.\n\n\
Parameters:\n\
- **prompt**: The question to ask (required)\n\
- **options**: Optional list of suggested answers\n\n\
The answer arrives as this tool call's result."
                .into(),
            parameters: ToolParameterSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "prompt".into(),
                        json!({"type": "string", "description": "The question to ask"}),
                    );
                    let _ = m.insert(
                        "options".into(),
                        json!({
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Suggested answers"
                        }),
                    );
                    m
                },
                vec!["prompt".into()],
            ),
        }
    }

    async fn execute(&self, params: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let prompt = match require_str(&params, "prompt") {
            Ok(p) => p,
            Err(e) => return Ok(e),
        };
        let options = optional_str_array(&params, "options");

        match self.behavior {
            AskBehavior::Suspend => Ok(ToolOutput {
                content: "Question presented to the user; awaiting their answer.".into(),
                details: Some(json!({
                    "prompt": prompt,
                    "options": options,
                })),
                is_error: None,
            }),
            AskBehavior::Passthrough => Ok(text_result(
                format!(
                    "No human operator is reachable from this agent. Unanswered question: \
\"{prompt}\". Proceed with your best assumption and state it explicitly."
                ),
                false,
            )),
        }
    }
}
