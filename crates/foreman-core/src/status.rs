//! Task and agent status state machines.
//!
//! Both enums serialize as snake_case strings on the wire. Transition
//! validity lives here so every mutation site shares one rule set.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet running.
    Created,
    /// A run loop is driving the task.
    Running,
    /// Suspended awaiting a human answer.
    Interrupted,
    /// Finished with a final answer.
    Completed,
    /// Ended by an unrecoverable error.
    Failed,
}

impl TaskStatus {
    /// Whether this status is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether a transition to `next` is valid.
    #[must_use]
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Created, Self::Running)
                | (Self::Running, Self::Interrupted)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Interrupted, Self::Running)
                | (Self::Interrupted, Self::Failed)
        )
    }

    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Interrupted => "interrupted",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Activity status of an agent.
///
/// `Processing` and `Typing` are re-entrant: an agent may report the same
/// status repeatedly across loop iterations without that being a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not currently driving a run loop.
    Idle,
    /// Run loop entered, not yet waiting on the model.
    Active,
    /// Waiting on the model or executing tools.
    Processing,
    /// Producing output content.
    Typing,
}

impl AgentStatus {
    /// Wire string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Active => "active",
            Self::Processing => "processing",
            Self::Typing => "typing",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
