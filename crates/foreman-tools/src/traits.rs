//! Core trait and DI abstractions for the tool system.
//!
//! Defines [`AgentTool`] — the trait every tool implements — plus the
//! dependency-injection traits tools use to reach back into the runtime.
//! The runtime provides concrete implementations of these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use foreman_core::tools::{ConcurrencyClass, Tool, ToolKind, ToolOutput};

use crate::artifacts::ArtifactMap;
use crate::errors::ToolError;

// ─────────────────────────────────────────────────────────────────────────────
// Tool context
// ─────────────────────────────────────────────────────────────────────────────

/// Execution context passed to every tool invocation.
#[derive(Clone, Debug)]
pub struct ToolContext {
    /// Unique ID of this tool call.
    pub tool_call_id: String,
    /// Task the invoking agent belongs to.
    pub task_id: String,
    /// Agent invoking this tool.
    pub agent_id: String,
    /// Cancellation token for cooperative cancellation.
    pub cancellation: CancellationToken,
    /// Shared artifact map for this task.
    pub artifacts: ArtifactMap,
}

// ─────────────────────────────────────────────────────────────────────────────
// AgentTool trait
// ─────────────────────────────────────────────────────────────────────────────

/// The core trait that every tool must implement.
///
/// Each tool provides:
/// - **Schema** via [`definition()`](AgentTool::definition) — sent to the model
/// - **Execution** via [`execute()`](AgentTool::execute) — invoked with JSON params
/// - **Metadata** — name, side-effect kind, interactivity, stop-turn behavior
#[async_trait]
pub trait AgentTool: Send + Sync {
    /// Tool name — the exact string sent to/from the model.
    fn name(&self) -> &str;

    /// Side-effect classification, which implies the scheduling class.
    fn kind(&self) -> ToolKind;

    /// Whether this tool suspends the run loop awaiting human input.
    fn is_interactive(&self) -> bool {
        false
    }

    /// Whether dispatching this tool ends the current run loop pass.
    fn stops_turn(&self) -> bool {
        false
    }

    /// Scheduling class within one batch. Derived from [`kind()`](Self::kind).
    fn concurrency(&self) -> ConcurrencyClass {
        self.kind().concurrency()
    }

    /// Generate the [`Tool`] schema for the model.
    fn definition(&self) -> Tool;

    /// Execute the tool with JSON arguments.
    async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Delegation types
// ─────────────────────────────────────────────────────────────────────────────

/// A request to run a named sub-agent against a task description.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationRequest {
    /// What the sub-agent should do — becomes its sole user turn.
    pub description: String,
    /// Key into the sub-agent specification registry.
    pub subagent_type: String,
}

/// Result of a completed sub-agent run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationOutcome {
    /// The sub-agent instance that ran.
    pub subagent_id: String,
    /// The nested loop's final answer.
    pub final_answer: String,
    /// Turns the nested loop took.
    pub turns: u32,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Sub-agent spawning seam — implemented by the runtime's sub-agent manager.
#[async_trait]
pub trait Delegator: Send + Sync {
    /// Names of the registered sub-agent specifications.
    fn known_types(&self) -> Vec<String>;

    /// Run a sub-agent to completion and return its final answer.
    async fn delegate(
        &self,
        request: DelegationRequest,
        ctx: &ToolContext,
    ) -> Result<DelegationOutcome, ToolError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress reporting
// ─────────────────────────────────────────────────────────────────────────────

/// A pure progress report from the status-update tool.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// Current phase label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Progress percentage (0–100).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Free-form status note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Progress sink seam — implemented by the runtime over the task service.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Record a progress update and broadcast it as a dialogue event.
    async fn report(
        &self,
        task_id: &str,
        agent_id: &str,
        update: ProgressUpdate,
    ) -> Result<(), ToolError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_context_construction() {
        let ctx = ToolContext {
            tool_call_id: "call_1".into(),
            task_id: "task_1".into(),
            agent_id: "agent_1".into(),
            cancellation: CancellationToken::new(),
            artifacts: ArtifactMap::new(),
        };
        assert_eq!(ctx.tool_call_id, "call_1");
        assert_eq!(ctx.task_id, "task_1");
        assert!(!ctx.cancellation.is_cancelled());
    }

    #[test]
    fn delegation_request_serde() {
        let req = DelegationRequest {
            description: "summarize findings".into(),
            subagent_type: "researcher".into(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["subagentType"], "researcher");
    }

    #[test]
    fn progress_update_omits_empty_fields() {
        let update = ProgressUpdate {
            phase: Some("analysis".into()),
            progress: None,
            note: None,
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["phase"], "analysis");
        assert!(json.get("progress").is_none());
        assert!(json.get("note").is_none());
    }
}
