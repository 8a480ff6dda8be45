//! Agent run loop — drives one agent's think → act → observe cycle.
//!
//! Each iteration asks the model for the next action. Plain content with no
//! tool calls is the final answer. Tool calls are dispatched through the
//! batch scheduler; one tool-result message per call is appended in issue
//! order before the next iteration. Dispatching the interactive
//! clarifying-question tool suspends the loop behind a checkpoint instead
//! of looping; an unrecoverable model error aborts the loop and fails the
//! task.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use foreman_core::events::{
    AgentEvent, BaseEvent, DialogueContent, Direction, StreamStatus, dialogue_event,
};
use foreman_core::messages::{Conversation, Message};
use foreman_core::status::{AgentStatus, TaskStatus};
use foreman_tools::artifacts::ArtifactMap;
use foreman_tools::registry::ToolRegistry;

use crate::agent::tool_executor::{DispatchContext, dispatch_batch};
use crate::errors::RuntimeError;
use crate::provider::GenerateRequest;
use crate::types::{RunComponents, RunConfig, RunOutcome};

/// Drive one agent to a final answer, a suspension, or a failure.
#[instrument(
    skip_all,
    fields(task_id, agent_id, model = components.provider.model())
)]
pub async fn run_agent(
    components: &RunComponents,
    registry: &ToolRegistry,
    task_id: &str,
    agent_id: &str,
    system_prompt: &str,
    mut conversation: Conversation,
    artifacts: &ArtifactMap,
    cancel: &CancellationToken,
    config: &RunConfig,
) -> RunOutcome {
    let tasks = &components.tasks;
    let emitter = &components.emitter;

    tasks.set_agent_status(agent_id, AgentStatus::Active);

    for turn in 1..=config.max_turns {
        if cancel.is_cancelled() {
            return cancelled(components, task_id, agent_id, config);
        }

        // 1. Ask the model for the next action
        tasks.set_agent_status(agent_id, AgentStatus::Processing);
        let request =
            GenerateRequest::from_conversation(system_prompt, &conversation, registry.definitions());
        let response = match components.provider.generate(&request).await {
            Ok(r) => r,
            Err(e) => {
                error!(task_id, agent_id, turn, error = %e, "model call failed");
                return fail(components, task_id, agent_id, config, e.to_string());
            }
        };

        // 2. Surface thinking, if any
        if let Some(thinking) = &response.thinking {
            let _ = emitter.emit(AgentEvent::ThinkingUpdate {
                base: BaseEvent::now(task_id, agent_id),
                status: StreamStatus::Started,
                content: None,
            });
            let _ = emitter.emit(AgentEvent::ThinkingUpdate {
                base: BaseEvent::now(task_id, agent_id),
                status: StreamStatus::Complete,
                content: Some(thinking.clone()),
            });
        }

        conversation.push(Message::Assistant {
            content: response.content.clone(),
            tool_calls: response.tool_calls.clone(),
            thinking: response.thinking.clone(),
        });

        // 3. No tool calls — the content is the final answer
        if response.tool_calls.is_empty() {
            let final_answer = response.content.unwrap_or_default();
            tasks.set_agent_status(agent_id, AgentStatus::Typing);
            let _ = emitter.emit(AgentEvent::ContentStream {
                base: BaseEvent::now(task_id, agent_id),
                status: StreamStatus::Started,
                content: None,
                full_content: None,
            });
            let _ = emitter.emit(AgentEvent::ContentStream {
                base: BaseEvent::now(task_id, agent_id),
                status: StreamStatus::Complete,
                content: None,
                full_content: Some(final_answer.clone()),
            });
            let _ = emitter.emit(dialogue_event(
                task_id,
                agent_id,
                Direction::Output,
                DialogueContent::text(final_answer.clone()),
                config.sender.clone(),
            ));

            if config.manage_task_status {
                if let Err(e) = tasks.set_task_status(task_id, TaskStatus::Completed) {
                    warn!(task_id, error = %e, "completion status change rejected");
                }
                let _ = emitter.emit(AgentEvent::TaskCompleted {
                    base: BaseEvent::now(task_id, agent_id),
                    final_content: final_answer.clone(),
                });
            }
            tasks.set_agent_status(agent_id, AgentStatus::Idle);
            components.limiter.forget(agent_id);
            info!(task_id, agent_id, turns = turn, "run completed");
            return RunOutcome::Completed {
                final_answer,
                turns: turn,
            };
        }

        // 4. Dispatch the batch
        let dispatch_ctx = DispatchContext {
            registry,
            limiter: components.limiter.as_ref(),
            tasks: tasks.as_ref(),
            emitter: emitter.as_ref(),
            artifacts,
            task_id,
            agent_id,
            cancel,
        };
        let batch = dispatch_batch(&response.tool_calls, &dispatch_ctx).await;

        // A cancelled loop discards results on arrival.
        if cancel.is_cancelled() {
            return cancelled(components, task_id, agent_id, config);
        }

        for result in &batch.results {
            conversation.push(Message::tool_result(
                result.tool_call_id.clone(),
                result.result.content.clone(),
                result.result.is_error.unwrap_or(false),
            ));
        }

        // 5. An interactive call suspends instead of looping
        if let Some(question) = batch.pending {
            match components
                .interrupts
                .interrupt(task_id, agent_id, question, conversation)
                .await
            {
                Ok(checkpoint) => {
                    if config.manage_task_status {
                        if let Err(e) = tasks.set_task_status(task_id, TaskStatus::Interrupted) {
                            warn!(task_id, error = %e, "interrupt status change rejected");
                        }
                    }
                    tasks.set_agent_status(agent_id, AgentStatus::Idle);
                    info!(task_id, agent_id, turn, "run suspended on question");
                    return RunOutcome::Suspended { checkpoint };
                }
                Err(e) => {
                    error!(task_id, agent_id, error = %e, "interrupt rejected");
                    return fail(components, task_id, agent_id, config, e.to_string());
                }
            }
        }
    }

    let error = RuntimeError::MaxTurns(config.max_turns).to_string();
    warn!(task_id, agent_id, max_turns = config.max_turns, "turn budget exhausted");
    fail(components, task_id, agent_id, config, error)
}

fn cancelled(
    components: &RunComponents,
    task_id: &str,
    agent_id: &str,
    config: &RunConfig,
) -> RunOutcome {
    info!(task_id, agent_id, "run cancelled");
    if config.manage_task_status {
        if let Err(e) = components.tasks.set_task_status(task_id, TaskStatus::Failed) {
            warn!(task_id, error = %e, "cancel status change rejected");
        }
        let _ = components.emitter.emit(AgentEvent::TaskFailed {
            base: BaseEvent::now(task_id, agent_id),
            error: "run cancelled".into(),
        });
    }
    components.tasks.set_agent_status(agent_id, AgentStatus::Idle);
    components.limiter.forget(agent_id);
    RunOutcome::Cancelled
}

fn fail(
    components: &RunComponents,
    task_id: &str,
    agent_id: &str,
    config: &RunConfig,
    error: String,
) -> RunOutcome {
    if config.manage_task_status {
        if let Err(e) = components.tasks.set_task_status(task_id, TaskStatus::Failed) {
            warn!(task_id, error = %e, "failure status change rejected");
        }
        let _ = components.emitter.emit(AgentEvent::TaskFailed {
            base: BaseEvent::now(task_id, agent_id),
            error: error.clone(),
        });
    }
    components.tasks.set_agent_status(agent_id, AgentStatus::Idle);
    components.limiter.forget(agent_id);
    RunOutcome::Failed { error }
}
