//! Core types for the task registry.
//!
//! All serializable types use `camelCase` for wire compatibility with
//! connected observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foreman_core::status::{AgentStatus, TaskStatus};

/// A unit of orchestrated work.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Task ID (`task_…`).
    pub id: String,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Current phase label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Progress percentage (0–100).
    pub progress: u8,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// The supervisor agent driving this task, once registered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_id: Option<String>,
}

impl Task {
    /// Create a task in the `Created` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: foreman_core::ids::task_id(),
            status: TaskStatus::Created,
            phase: None,
            progress: 0,
            created_at: Utc::now(),
            supervisor_id: None,
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// The role an agent plays within a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    /// Drives the task's top-level run loop.
    Supervisor,
    /// A standing worker role.
    Worker,
    /// A lazily created delegation instance.
    Subagent,
}

impl AgentKind {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supervisor => "supervisor",
            Self::Worker => "worker",
            Self::Subagent => "subagent",
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical agent role within a task.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Agent ID (`agent_…`).
    pub id: String,
    /// Owning task.
    pub task_id: String,
    /// Role.
    pub kind: AgentKind,
    /// Activity status.
    pub status: AgentStatus,
}

impl AgentRecord {
    /// Create an idle agent record for a task.
    #[must_use]
    pub fn new(task_id: impl Into<String>, kind: AgentKind) -> Self {
        Self {
            id: foreman_core::ids::agent_id(),
            task_id: task_id.into(),
            kind,
            status: AgentStatus::Idle,
        }
    }
}
