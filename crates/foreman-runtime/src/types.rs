//! Shared runtime types.

use std::sync::Arc;

use crate::agent::event_emitter::EventEmitter;
use crate::agent::status_limit::StatusRateLimiter;
use crate::checkpoint::{Checkpoint, PendingQuestion};
use crate::interrupt::InterruptController;
use crate::provider::ModelProvider;
use crate::tasks::TaskService;

use foreman_core::tools::ToolOutput;

/// Default turn budget for a run loop.
pub const DEFAULT_MAX_TURNS: u32 = 50;

/// How one run loop invocation ended.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    /// The model produced a final answer.
    Completed {
        /// The final answer text.
        final_answer: String,
        /// Turns the loop took.
        turns: u32,
    },
    /// The loop suspended on a clarifying question.
    Suspended {
        /// The persisted resumable snapshot.
        checkpoint: Checkpoint,
    },
    /// The loop aborted on an unrecoverable error.
    Failed {
        /// Error description.
        error: String,
    },
    /// The loop was cancelled; any in-flight results were discarded.
    Cancelled,
}

impl RunOutcome {
    /// Whether the run produced a final answer.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Whether the run suspended awaiting human input.
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        matches!(self, Self::Suspended { .. })
    }
}

/// Per-run configuration.
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Turn budget before the run fails.
    pub max_turns: u32,
    /// Sender label used on dialogue events.
    pub sender: String,
    /// Whether this loop owns its task's status (false for nested
    /// sub-agent loops — the parent's task stays running).
    pub manage_task_status: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            sender: "agent".into(),
            manage_task_status: true,
        }
    }
}

/// Result of executing (or resolving) one tool call.
#[derive(Clone, Debug)]
pub struct ToolExecutionResult {
    /// Tool call ID.
    pub tool_call_id: String,
    /// Tool name.
    pub tool_name: String,
    /// The result fed back to the model.
    pub result: ToolOutput,
    /// Wall-clock execution time.
    pub duration_ms: u64,
}

/// Outcome of dispatching one batch of tool calls.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One result per resolved call, in call-issue order. The interactive
    /// call that produced `pending` has no entry — its result arrives on
    /// resume.
    pub results: Vec<ToolExecutionResult>,
    /// The question an interactive call suspended the batch on, if any.
    pub pending: Option<PendingQuestion>,
}

/// Shared handles every run loop needs.
#[derive(Clone)]
pub struct RunComponents {
    /// Model capability.
    pub provider: Arc<dyn ModelProvider>,
    /// Task/agent registry.
    pub tasks: Arc<TaskService>,
    /// Event fan-out.
    pub emitter: Arc<EventEmitter>,
    /// Interrupt/resume protocol.
    pub interrupts: Arc<InterruptController>,
    /// Status-update rate limiter.
    pub limiter: Arc<StatusRateLimiter>,
}
