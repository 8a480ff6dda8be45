//! Interrupt/resume controller.
//!
//! Two states per (task, agent) pair: **Running** and **Interrupted**.
//! Dispatching the clarifying-question tool moves Running → Interrupted:
//! the controller writes a checkpoint and emits an `approval_required`
//! event. An explicit [`resume`](InterruptController::resume) moves
//! Interrupted → Running: the checkpoint is consumed exactly once, the
//! answer is appended as the pending call's tool result, and the caller
//! re-enters the run loop with the reconstructed conversation.
//!
//! Only one outstanding question per (task, agent) is permitted — the
//! store's atomic save-if-absent rejects a second interrupt.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use foreman_core::events::approval_event;
use foreman_core::messages::{Conversation, Message};

use crate::agent::event_emitter::EventEmitter;
use crate::checkpoint::{Checkpoint, CheckpointError, CheckpointStore, PendingQuestion};
use crate::errors::RuntimeError;

/// Suspends run loops on clarifying questions and resumes them on answers.
pub struct InterruptController {
    store: Arc<dyn CheckpointStore>,
    emitter: Arc<EventEmitter>,
}

impl InterruptController {
    /// Create a controller over the given checkpoint store.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>, emitter: Arc<EventEmitter>) -> Self {
        Self { store, emitter }
    }

    /// Suspend a (task, agent) pair on a question.
    ///
    /// Writes the checkpoint and emits `approval_required`. Fails with
    /// [`RuntimeError::AlreadyInterrupted`] if a checkpoint is already live.
    #[instrument(skip(self, question, conversation), fields(task_id, agent_id))]
    pub async fn interrupt(
        &self,
        task_id: &str,
        agent_id: &str,
        question: PendingQuestion,
        conversation: Conversation,
    ) -> Result<Checkpoint, RuntimeError> {
        let checkpoint = Checkpoint {
            task_id: task_id.to_owned(),
            agent_id: agent_id.to_owned(),
            question: question.clone(),
            conversation,
            created_at: Utc::now(),
        };
        match self.store.save(checkpoint.clone()).await {
            Ok(()) => {}
            Err(CheckpointError::AlreadyExists { task_id, agent_id }) => {
                return Err(RuntimeError::AlreadyInterrupted { task_id, agent_id });
            }
            Err(e) => return Err(e.into()),
        }
        info!(task_id, agent_id, prompt = %question.prompt, "run interrupted");
        metrics::counter!("foreman_interrupts_total").increment(1);
        let _ = self.emitter.emit(approval_event(
            task_id,
            agent_id,
            question.prompt,
            question.options,
        ));
        Ok(checkpoint)
    }

    /// Resume a suspended (task, agent) pair with an answer.
    ///
    /// Consumes the checkpoint and returns the conversation with the answer
    /// appended as the pending call's tool result. Fails with
    /// [`RuntimeError::NoPendingInterrupt`] if no checkpoint is live.
    #[instrument(skip(self, answer), fields(task_id, agent_id))]
    pub async fn resume(
        &self,
        task_id: &str,
        agent_id: &str,
        answer: &str,
    ) -> Result<Conversation, RuntimeError> {
        let checkpoint = self.store.delete(task_id, agent_id).await?.ok_or_else(|| {
            RuntimeError::NoPendingInterrupt {
                task_id: task_id.to_owned(),
                agent_id: agent_id.to_owned(),
            }
        })?;
        info!(task_id, agent_id, "run resumed");
        metrics::counter!("foreman_resumes_total").increment(1);
        let mut conversation = checkpoint.conversation;
        conversation.push(Message::tool_result(
            checkpoint.question.tool_call_id,
            answer,
            false,
        ));
        Ok(conversation)
    }

    /// Whether a (task, agent) pair is currently interrupted.
    pub async fn is_interrupted(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<bool, RuntimeError> {
        Ok(self.store.load(task_id, agent_id).await?.is_some())
    }

    /// The outstanding question for a (task, agent) pair, if any.
    pub async fn pending_question(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Option<PendingQuestion>, RuntimeError> {
        Ok(self
            .store
            .load(task_id, agent_id)
            .await?
            .map(|cp| cp.question))
    }
}
