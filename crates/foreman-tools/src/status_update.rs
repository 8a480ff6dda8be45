//! `update_status` tool — pure progress reporting.
//!
//! Lets an agent surface a phase label, a progress percentage, and a short
//! note to observers without touching any other state. Consecutive use is
//! rate-limited by the dispatcher so an agent cannot monopolize the event
//! stream with status chatter instead of making progress.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use foreman_core::tools::{Tool, ToolKind, ToolOutput, ToolParameterSchema, error_result, text_result};

use crate::errors::ToolError;
use crate::params::{optional_str, optional_u64};
use crate::traits::{AgentTool, ProgressSink, ProgressUpdate, ToolContext};

/// The `update_status` tool reports progress through a [`ProgressSink`].
pub struct UpdateStatusTool {
    sink: Arc<dyn ProgressSink>,
}

impl UpdateStatusTool {
    /// Create the tool with the given sink.
    #[must_use]
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl AgentTool for UpdateStatusTool {
    fn name(&self) -> &str {
        "update_status"
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Pure
    }

    fn definition(&self) -> Tool {
        Tool {
            name: "update_status".into(),
            description: "Report task progress to observers. Provide at least one of:\n\
- **phase**: short label for the current phase of work\n\
- **progress**: completion percentage, 0-100\n\
- **note**: one-line status note\n\n\
At most two consecutive calls are allowed; do real work between updates."
                .into(),
            parameters: ToolParameterSchema::object(
                {
                    let mut m = serde_json::Map::new();
                    let _ = m.insert(
                        "phase".into(),
                        json!({"type": "string", "description": "Current phase label"}),
                    );
                    let _ = m.insert(
                        "progress".into(),
                        json!({"type": "number", "description": "Completion percentage (0-100)"}),
                    );
                    let _ = m.insert(
                        "note".into(),
                        json!({"type": "string", "description": "One-line status note"}),
                    );
                    m
                },
                Vec::new(),
            ),
        }
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let phase = optional_str(&params, "phase");
        let note = optional_str(&params, "note");
        let progress = match optional_u64(&params, "progress") {
            Some(p) if p > 100 => {
                return Ok(error_result("progress must be between 0 and 100"));
            }
            Some(p) => Some(p as u8),
            None => None,
        };

        if phase.is_none() && progress.is_none() && note.is_none() {
            return Ok(error_result(
                "Provide at least one of: phase, progress, note",
            ));
        }

        self.sink
            .report(
                &ctx.task_id,
                &ctx.agent_id,
                ProgressUpdate {
                    phase,
                    progress,
                    note,
                },
            )
            .await?;

        Ok(text_result("Status update recorded.", false))
    }
}
