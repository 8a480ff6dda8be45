//! Sub-agent specifications and the delegation manager.
//!
//! A supervisor's `task` tool delegates through the [`SubagentManager`]:
//! it looks up the named [`SubagentSpec`], seeds a fresh conversation from
//! the delegation description, narrows the tool registry to the spec's
//! subset, and drives a nested run loop to completion. Nested suspension is
//! not supported — a sub-agent only ever sees the non-suspending variant of
//! the clarifying-question tool, and only when its spec grants it.
//!
//! Artifacts the sub-agent produced merge into the parent's shared map
//! last-writer-wins on completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use foreman_core::events::{AgentEvent, BaseEvent};
use foreman_core::messages::Conversation;
use foreman_tools::artifacts::ArtifactMap;
use foreman_tools::ask_user::AskUserTool;
use foreman_tools::errors::ToolError;
use foreman_tools::registry::ToolRegistry;
use foreman_tools::status_update::UpdateStatusTool;
use foreman_tools::traits::{DelegationOutcome, DelegationRequest, Delegator, ToolContext};

use crate::agent::run_loop::run_agent;
use crate::tasks::AgentKind;
use crate::types::{RunComponents, RunConfig, RunOutcome};

/// Specification of a named sub-agent role.
#[derive(Clone, Debug)]
pub struct SubagentSpec {
    /// Registry key — the `subagent_type` the model names.
    pub name: String,
    /// System instructions for the sub-agent.
    pub instructions: String,
    /// Names of tools from the worker set this sub-agent may use.
    pub tools: Vec<String>,
    /// Whether the (non-suspending) question tool is granted.
    pub allow_questions: bool,
}

impl SubagentSpec {
    /// Create a spec with no tools granted.
    #[must_use]
    pub fn new(name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            tools: Vec::new(),
            allow_questions: false,
        }
    }

    /// Grant a tool subset.
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Grant the non-suspending question tool.
    #[must_use]
    pub fn with_questions(mut self) -> Self {
        self.allow_questions = true;
        self
    }
}

/// Runs nested sub-agent loops on behalf of the `task` tool.
pub struct SubagentManager {
    components: RunComponents,
    /// Worker tools plus the sub-agent variants of the built-ins.
    available: ToolRegistry,
    specs: HashMap<String, SubagentSpec>,
    max_turns: u32,
}

impl SubagentManager {
    /// Create a manager over the worker tool set and spec registry.
    ///
    /// The spec registry is assembled here, at construction time — an
    /// unknown type at delegation time is a structured tool error, never a
    /// lookup against mutable global state.
    #[must_use]
    pub fn new(
        components: RunComponents,
        worker_tools: &ToolRegistry,
        specs: Vec<SubagentSpec>,
        max_turns: u32,
    ) -> Self {
        let mut available = worker_tools.clone();
        available.register(Arc::new(AskUserTool::passthrough()));
        available.register(Arc::new(UpdateStatusTool::new(components.tasks.clone())));
        Self {
            components,
            available,
            specs: specs.into_iter().map(|s| (s.name.clone(), s)).collect(),
            max_turns,
        }
    }

    /// Number of registered specs.
    #[must_use]
    pub fn spec_count(&self) -> usize {
        self.specs.len()
    }

    /// The tool names a spec actually receives.
    fn granted_tools(spec: &SubagentSpec) -> Vec<String> {
        spec.tools
            .iter()
            .filter(|name| spec.allow_questions || name.as_str() != "ask_user")
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Delegator for SubagentManager {
    fn known_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.specs.keys().cloned().collect();
        names.sort();
        names
    }

    #[instrument(skip_all, fields(subagent_type = %request.subagent_type, task_id = %ctx.task_id))]
    async fn delegate(
        &self,
        request: DelegationRequest,
        ctx: &ToolContext,
    ) -> Result<DelegationOutcome, ToolError> {
        let spec = self
            .specs
            .get(&request.subagent_type)
            .ok_or_else(|| ToolError::Delegation {
                message: format!("unknown subagent type: {}", request.subagent_type),
            })?;

        let start = Instant::now();
        let subagent = self
            .components
            .tasks
            .register_agent(&ctx.task_id, AgentKind::Subagent)
            .map_err(|e| ToolError::Delegation {
                message: e.to_string(),
            })?;
        info!(subagent_id = %subagent.id, "subagent spawned");
        metrics::counter!("foreman_subagents_spawned_total").increment(1);
        let _ = self.components.emitter.emit(AgentEvent::SubagentSpawned {
            base: BaseEvent::now(&ctx.task_id, &ctx.agent_id),
            subagent_id: subagent.id.clone(),
            subagent_type: spec.name.clone(),
            description: request.description.clone(),
        });

        // Copy-in: fresh conversation and artifact map, never shared state.
        let registry = self.available.subset(&Self::granted_tools(spec));
        let conversation = Conversation::seeded(request.description);
        let child_artifacts = ArtifactMap::new();
        let config = RunConfig {
            max_turns: self.max_turns,
            sender: spec.name.clone(),
            manage_task_status: false,
        };

        let outcome = run_agent(
            &self.components,
            &registry,
            &ctx.task_id,
            &subagent.id,
            &spec.instructions,
            conversation,
            &child_artifacts,
            &ctx.cancellation,
            &config,
        )
        .await;

        self.components.tasks.remove_agent(&subagent.id);
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            RunOutcome::Completed {
                final_answer,
                turns,
            } => {
                // Copy-out: merge produced artifacts into the parent's map.
                ctx.artifacts.merge_from(&child_artifacts);
                let _ = self.components.emitter.emit(AgentEvent::SubagentCompleted {
                    base: BaseEvent::now(&ctx.task_id, &ctx.agent_id),
                    subagent_id: subagent.id.clone(),
                    subagent_type: spec.name.clone(),
                    duration_ms,
                    turns,
                });
                Ok(DelegationOutcome {
                    subagent_id: subagent.id,
                    final_answer,
                    turns,
                    duration_ms,
                })
            }
            RunOutcome::Failed { error } => {
                warn!(subagent_id = %subagent.id, error, "subagent run failed");
                Err(ToolError::Delegation { message: error })
            }
            RunOutcome::Suspended { .. } => {
                // Unreachable by construction: sub-agents never hold the
                // suspending question tool.
                Err(ToolError::Delegation {
                    message: "sub-agent attempted to suspend; interactive input is not \
available to sub-agents"
                        .into(),
                })
            }
            RunOutcome::Cancelled => Err(ToolError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use parking_lot::Mutex;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use foreman_core::messages::ToolCall;
    use foreman_core::tools::{Tool, ToolKind, ToolOutput, ToolParameterSchema, text_result};
    use foreman_tools::traits::AgentTool;

    use crate::agent::event_emitter::EventEmitter;
    use crate::agent::status_limit::StatusRateLimiter;
    use crate::checkpoint::InMemoryCheckpointStore;
    use crate::interrupt::InterruptController;
    use crate::provider::{GenerateRequest, ModelError, ModelProvider, ModelResponse};
    use crate::tasks::TaskService;

    struct ScriptedProvider {
        script: Mutex<VecDeque<ModelResponse>>,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn model(&self) -> &str {
            "scripted"
        }
        async fn generate(
            &self,
            _request: &GenerateRequest,
        ) -> Result<ModelResponse, ModelError> {
            self.script
                .lock()
                .pop_front()
                .ok_or_else(|| ModelError::InvalidRequest {
                    message: "script exhausted".into(),
                })
        }
    }

    /// Pure tool that writes an artifact for merge tests.
    struct NoteWriter;

    #[async_trait]
    impl AgentTool for NoteWriter {
        fn name(&self) -> &str {
            "write_note"
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Mutating
        }
        fn definition(&self) -> Tool {
            Tool {
                name: "write_note".into(),
                description: "Writes a note artifact".into(),
                parameters: ToolParameterSchema::object(serde_json::Map::new(), Vec::new()),
            }
        }
        async fn execute(
            &self,
            params: serde_json::Value,
            ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            let path = params
                .get("path")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("note.txt");
            ctx.artifacts.insert(path, "from subagent");
            Ok(text_result("noted", false))
        }
    }

    struct Fixture {
        manager: SubagentManager,
        tasks: Arc<TaskService>,
        emitter: Arc<EventEmitter>,
        task_id: String,
    }

    fn make_fixture(script: Vec<ModelResponse>, specs: Vec<SubagentSpec>) -> Fixture {
        let emitter = Arc::new(EventEmitter::new());
        let tasks = Arc::new(TaskService::new(emitter.clone()));
        let components = RunComponents {
            provider: Arc::new(ScriptedProvider {
                script: Mutex::new(script.into_iter().collect()),
            }),
            tasks: tasks.clone(),
            emitter: emitter.clone(),
            interrupts: Arc::new(InterruptController::new(
                Arc::new(InMemoryCheckpointStore::new()),
                emitter.clone(),
            )),
            limiter: Arc::new(StatusRateLimiter::new("update_status", 2)),
        };

        let mut worker_tools = ToolRegistry::new();
        worker_tools.register(Arc::new(NoteWriter));

        let manager = SubagentManager::new(components, &worker_tools, specs, 10);
        let task = tasks.create_task();

        Fixture {
            manager,
            tasks,
            emitter,
            task_id: task.id,
        }
    }

    fn tool_ctx(fixture: &Fixture) -> ToolContext {
        ToolContext {
            tool_call_id: "call_delegate".into(),
            task_id: fixture.task_id.clone(),
            agent_id: "agent_parent".into(),
            cancellation: CancellationToken::new(),
            artifacts: ArtifactMap::new(),
        }
    }

    fn researcher() -> SubagentSpec {
        SubagentSpec::new("researcher", "You research things.")
            .with_tools(vec!["write_note".into()])
    }

    #[tokio::test]
    async fn known_types_sorted() {
        let fixture = make_fixture(
            vec![],
            vec![
                SubagentSpec::new("writer", "w"),
                SubagentSpec::new("researcher", "r"),
            ],
        );
        assert_eq!(fixture.manager.known_types(), vec!["researcher", "writer"]);
        assert_eq!(fixture.manager.spec_count(), 2);
    }

    #[tokio::test]
    async fn delegate_runs_nested_loop_to_completion() {
        let fixture = make_fixture(
            vec![ModelResponse::text("sub-agent answer")],
            vec![researcher()],
        );
        let mut rx = fixture.emitter.subscribe();

        let outcome = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "dig into the archive".into(),
                    subagent_type: "researcher".into(),
                },
                &tool_ctx(&fixture),
            )
            .await
            .unwrap();

        assert_eq!(outcome.final_answer, "sub-agent answer");
        assert_eq!(outcome.turns, 1);

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type().to_owned());
        }
        assert!(types.contains(&"subagent_spawned".to_owned()));
        assert!(types.contains(&"subagent_completed".to_owned()));
        // Nested completion must NOT complete the parent task.
        assert!(!types.contains(&"task_completed".to_owned()));

        // The sub-agent instance was destroyed when its loop ended.
        assert_eq!(fixture.tasks.agent_count(), 0);
    }

    #[tokio::test]
    async fn unknown_type_is_delegation_error() {
        let fixture = make_fixture(vec![], vec![researcher()]);
        let err = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "x".into(),
                    subagent_type: "alchemist".into(),
                },
                &tool_ctx(&fixture),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown subagent type"));
    }

    #[tokio::test]
    async fn artifacts_merge_into_parent_on_completion() {
        let call = ToolCall::new(
            "write_note",
            json!({"path": "findings.md"}).as_object().cloned().unwrap(),
        );
        let fixture = make_fixture(
            vec![
                ModelResponse::calls(vec![call]),
                ModelResponse::text("wrote it up"),
            ],
            vec![researcher()],
        );

        let ctx = tool_ctx(&fixture);
        let _ = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "write findings".into(),
                    subagent_type: "researcher".into(),
                },
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(
            ctx.artifacts.get("findings.md").as_deref(),
            Some("from subagent")
        );
    }

    #[tokio::test]
    async fn failed_subagent_surfaces_as_delegation_error() {
        // Empty script — the first generate fails.
        let fixture = make_fixture(vec![], vec![researcher()]);
        let err = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "x".into(),
                    subagent_type: "researcher".into(),
                },
                &tool_ctx(&fixture),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Delegation { .. }));
        assert_eq!(fixture.tasks.agent_count(), 0);
    }

    #[tokio::test]
    async fn question_tool_is_passthrough_for_subagents() {
        // A sub-agent granted ask_user gets the non-suspending variant:
        // the loop continues and completes instead of checkpointing.
        let ask = ToolCall::new(
            "ask_user",
            json!({"prompt": "Which year?"}).as_object().cloned().unwrap(),
        );
        let fixture = make_fixture(
            vec![
                ModelResponse::calls(vec![ask]),
                ModelResponse::text("assumed 2024"),
            ],
            vec![SubagentSpec::new("asker", "You ask.")
                .with_tools(vec!["ask_user".into()])
                .with_questions()],
        );
        let mut rx = fixture.emitter.subscribe();

        let outcome = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "figure out the year".into(),
                    subagent_type: "asker".into(),
                },
                &tool_ctx(&fixture),
            )
            .await
            .unwrap();

        assert_eq!(outcome.final_answer, "assumed 2024");
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type().to_owned());
        }
        assert!(!types.contains(&"approval_required".to_owned()));
    }

    #[tokio::test]
    async fn ask_user_withheld_without_grant() {
        // Spec names ask_user but never granted questions — the tool is
        // stripped, so the model's call resolves to "tool not found" and the
        // loop continues.
        let ask = ToolCall::new(
            "ask_user",
            json!({"prompt": "Which year?"}).as_object().cloned().unwrap(),
        );
        let fixture = make_fixture(
            vec![
                ModelResponse::calls(vec![ask]),
                ModelResponse::text("proceeded anyway"),
            ],
            vec![SubagentSpec::new("restricted", "No questions.")
                .with_tools(vec!["ask_user".into()])],
        );

        let outcome = fixture
            .manager
            .delegate(
                DelegationRequest {
                    description: "work".into(),
                    subagent_type: "restricted".into(),
                },
                &tool_ctx(&fixture),
            )
            .await
            .unwrap();
        assert_eq!(outcome.final_answer, "proceeded anyway");
    }
}
