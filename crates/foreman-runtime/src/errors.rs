//! Runtime error types.

use foreman_core::status::TaskStatus;

use crate::checkpoint::CheckpointError;
use crate::provider::ModelError;

/// Errors that can occur during orchestration.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Model capability error — the only class that terminates a task.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Task not found.
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Agent not found.
    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    /// The task already has an active run.
    #[error("Task busy: {0}")]
    TaskBusy(String),

    /// The orchestrator is at its concurrent-run limit.
    #[error("At capacity: {current} of {max} runs active")]
    AtCapacity {
        /// Currently active runs.
        current: usize,
        /// Configured maximum.
        max: usize,
    },

    /// A second interrupt was requested while one is outstanding.
    #[error("Agent {agent_id} of task {task_id} is already interrupted")]
    AlreadyInterrupted {
        /// Task with the outstanding interrupt.
        task_id: String,
        /// Interrupted agent.
        agent_id: String,
    },

    /// Resume was requested but no checkpoint is live.
    #[error("No pending interrupt for agent {agent_id} of task {task_id}")]
    NoPendingInterrupt {
        /// Task named by the resume request.
        task_id: String,
        /// Agent named by the resume request.
        agent_id: String,
    },

    /// A status change violated the task state machine.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: TaskStatus,
        /// Requested status.
        to: TaskStatus,
    },

    /// Checkpoint store failure.
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// The run exceeded its turn budget.
    #[error("Max turns ({0}) exceeded")]
    MaxTurns(u32),

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Internal / unexpected error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RuntimeError {
    /// Whether the error is recoverable within the running task.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Model(e) => e.is_retryable(),
            Self::TaskBusy(_)
            | Self::AtCapacity { .. }
            | Self::AlreadyInterrupted { .. }
            | Self::NoPendingInterrupt { .. }
            | Self::Cancelled => true,
            Self::UnknownTask(_)
            | Self::UnknownAgent(_)
            | Self::InvalidTransition { .. }
            | Self::Checkpoint(_)
            | Self::MaxTurns(_)
            | Self::Internal(_) => false,
        }
    }

    /// Error category string for event emission and transport mapping.
    #[must_use]
    pub fn category(&self) -> &str {
        match self {
            Self::Model(_) => "model",
            Self::UnknownTask(_) => "unknown_task",
            Self::UnknownAgent(_) => "unknown_agent",
            Self::TaskBusy(_) => "task_busy",
            Self::AtCapacity { .. } => "at_capacity",
            Self::AlreadyInterrupted { .. } => "already_interrupted",
            Self::NoPendingInterrupt { .. } => "no_pending_interrupt",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::Checkpoint(_) => "checkpoint",
            Self::MaxTurns(_) => "max_turns",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}
