//! `task` tool — delegation to named sub-agents.
//!
//! Exposed to a supervising agent as an ordinary tool. Invoking it runs an
//! entire nested agent loop (through the [`Delegator`] seam) and folds the
//! sub-agent's final answer back as this call's result. An unknown
//! `subagent_type` yields a structured error result listing the known types,
//! so the calling model can retry with a valid name.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use foreman_core::tools::{Tool, ToolKind, ToolOutput, ToolParameterSchema, error_result};

use crate::errors::ToolError;
use crate::params::require_str;
use crate::traits::{AgentTool, DelegationRequest, Delegator, ToolContext};

/// The `task` tool runs a named sub-agent against a task description.
pub struct DelegateTool {
    delegator: Arc<dyn Delegator>,
}

impl DelegateTool {
    /// Create the tool with the given delegator.
    #[must_use]
    pub fn new(delegator: Arc<dyn Delegator>) -> Self {
        Self { delegator }
    }
}

#[async_trait]
impl AgentTool for DelegateTool {
    fn name(&self) -> &str {
        "task"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Delegating
    }

    fn definition(&self) -> Tool {
        let known = self.delegator.known_types().join(", ");
        Tool {
            name: "task".into(),
            description: format!(
                "Delegate a self-contained piece of work to a specialized sub-agent. \
The sub-agent runs to completion with its own conversation and a narrowed \
tool set, then returns its final answer as this call's result.\n\n\
Parameters:\n\
- **description**: What the sub-agent should accomplish (required). Be \
specific — this is the only instruction it receives.\n\
- **subagent_type**: Which sub-agent to use (required). Available: {known}\n\n\
Sub-agents cannot ask the human questions; include everything they need in \
the description."
            ),
            parameters: ToolParameterSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "description".into(),
                        json!({"type": "string", "description": "Task for the sub-agent"}),
                    );
                    let _ = m.insert(
                        "subagent_type".into(),
                        json!({"type": "string", "description": "Registered sub-agent name"}),
                    );
                    m
                },
                vec!["description".into(), "subagent_type".into()],
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let description = match require_str(&params, "description") {
            Ok(d) => d,
            Err(e) => return Ok(e),
        };
        let subagent_type = match require_str(&params, "subagent_type") {
            Ok(t) => t,
            Err(e) => return Ok(e),
        };

        let known = self.delegator.known_types();
        if !known.contains(&subagent_type) {
            warn!(subagent_type, "unknown delegation target");
            return Ok(error_result(format!(
                "Unknown subagent_type \"{subagent_type}\". Known types: {}",
                known.join(", ")
            )));
        }

        let request = DelegationRequest {
            description,
            subagent_type: subagent_type.clone(),
        };
        match self.delegator.delegate(request, ctx).await {
            Ok(outcome) => {
                info!(
                    subagent_type,
                    subagent_id = %outcome.subagent_id,
                    turns = outcome.turns,
                    "delegation completed"
                );
                Ok(ToolOutput {
                    content: outcome.final_answer,
                    details: Some(json!({
                        "subagentId": outcome.subagent_id,
                        "subagentType": subagent_type,
                        "turns": outcome.turns,
                        "durationMs": outcome.duration_ms,
                    })),
                    is_error: None,
                })
            }
            Err(e) => Ok(error_result(format!("Delegation failed: {e}"))),
        }
    }
}
