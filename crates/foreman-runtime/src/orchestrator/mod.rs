//! Multi-task coordination and sub-agent delegation.

pub mod orchestrator;
pub mod subagents;

pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use subagents::{SubagentManager, SubagentSpec};
