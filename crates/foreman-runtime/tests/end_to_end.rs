//! End-to-end orchestration scenarios against a scripted model provider.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::broadcast;

use foreman_core::events::AgentEvent;
use foreman_core::messages::ToolCall;
use foreman_core::status::TaskStatus;
use foreman_runtime::checkpoint::InMemoryCheckpointStore;
use foreman_runtime::errors::RuntimeError;
use foreman_runtime::orchestrator::{Orchestrator, OrchestratorConfig, SubagentSpec};
use foreman_runtime::provider::{GenerateRequest, ModelError, ModelProvider, ModelResponse};
use foreman_tools::registry::ToolRegistry;

struct ScriptedProvider {
    script: Mutex<VecDeque<ModelResponse>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ModelResponse>) -> Self {
        Self {
            script: Mutex::new(responses.into_iter().collect()),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<ModelResponse, ModelError> {
        self.script
            .lock()
            .pop_front()
            .ok_or_else(|| ModelError::Transient {
                message: "script exhausted".into(),
            })
    }
}

fn make_orchestrator(
    script: Vec<ModelResponse>,
    subagents: Vec<SubagentSpec>,
) -> Arc<Orchestrator> {
    Orchestrator::new(
        Arc::new(ScriptedProvider::new(script)),
        ToolRegistry::new(),
        subagents,
        Arc::new(InMemoryCheckpointStore::new()),
        OrchestratorConfig::default(),
    )
}

async fn wait_for_event(
    rx: &mut broadcast::Receiver<AgentEvent>,
    event_type: &str,
) -> AgentEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event stream closed");
            if event.event_type() == event_type {
                return event;
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {event_type}"))
}

fn ask_call(prompt: &str) -> ToolCall {
    ToolCall::new(
        "ask_user",
        json!({"prompt": prompt}).as_object().cloned().unwrap(),
    )
}

#[tokio::test]
async fn question_interrupt_resume_completion() {
    let orch = make_orchestrator(
        vec![
            ModelResponse::calls(vec![ask_call("Which year?")]),
            ModelResponse::text("The report covers 2024."),
        ],
        Vec::new(),
    );
    let mut rx = orch.subscribe();

    // Create and start the task.
    let task = orch.create_task();
    assert_eq!(task.status, TaskStatus::Created);
    let agent_id = orch.start_task(&task.id, "Summarize the annual report").unwrap();

    // The supervisor asks its question and the run suspends.
    let approval = wait_for_event(&mut rx, "approval_required").await;
    match &approval {
        AgentEvent::ApprovalRequired { prompt, .. } => assert_eq!(prompt, "Which year?"),
        _ => unreachable!(),
    }
    assert_eq!(approval.base().task_id, task.id);
    assert_eq!(approval.base().agent_id, agent_id);

    let status = wait_for_event(&mut rx, "task_status_changed").await;
    match status {
        AgentEvent::TaskStatusChanged { new_status, .. } => {
            assert_eq!(new_status, TaskStatus::Interrupted);
        }
        _ => unreachable!(),
    }

    // Wait for the suspended run to release its slot, then resume.
    tokio::time::timeout(Duration::from_secs(2), async {
        while orch.has_active_run(&task.id) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    orch.resume_task(&task.id, &agent_id, "2024").await.unwrap();

    // The loop continues and completes, referencing the answer.
    let completed = wait_for_event(&mut rx, "task_completed").await;
    match completed {
        AgentEvent::TaskCompleted { final_content, .. } => {
            assert!(final_content.contains("2024"));
        }
        _ => unreachable!(),
    }
    assert_eq!(
        orch.tasks().get_task(&task.id).unwrap().status,
        TaskStatus::Completed
    );

    // The checkpoint was consumed exactly once.
    let err = orch
        .resume_task(&task.id, &agent_id, "2024")
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::NoPendingInterrupt { .. }));
}

#[tokio::test]
async fn supervisor_delegates_to_subagent() {
    let delegate = ToolCall::new(
        "task",
        json!({"description": "collect figures", "subagent_type": "researcher"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    // Script order: supervisor turn, nested sub-agent turn, supervisor turn.
    let orch = make_orchestrator(
        vec![
            ModelResponse::calls(vec![delegate]),
            ModelResponse::text("figures: 1, 2, 3"),
            ModelResponse::text("Final report using figures: 1, 2, 3"),
        ],
        vec![SubagentSpec::new(
            "researcher",
            "You collect figures from the archive.",
        )],
    );
    let mut rx = orch.subscribe();

    let task = orch.create_task();
    let _ = orch.start_task(&task.id, "Write the report").unwrap();

    let spawned = wait_for_event(&mut rx, "subagent_spawned").await;
    match spawned {
        AgentEvent::SubagentSpawned { subagent_type, .. } => {
            assert_eq!(subagent_type, "researcher");
        }
        _ => unreachable!(),
    }

    let _ = wait_for_event(&mut rx, "subagent_completed").await;

    let completed = wait_for_event(&mut rx, "task_completed").await;
    match completed {
        AgentEvent::TaskCompleted { final_content, .. } => {
            assert!(final_content.contains("figures: 1, 2, 3"));
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn unknown_delegation_target_recovers() {
    let bad_delegate = ToolCall::new(
        "task",
        json!({"description": "x", "subagent_type": "alchemist"})
            .as_object()
            .cloned()
            .unwrap(),
    );
    let orch = make_orchestrator(
        vec![
            ModelResponse::calls(vec![bad_delegate]),
            ModelResponse::text("recovered without delegation"),
        ],
        vec![SubagentSpec::new("researcher", "r")],
    );
    let mut rx = orch.subscribe();

    let task = orch.create_task();
    let _ = orch.start_task(&task.id, "go").unwrap();

    // The bad call fails as a structured tool result...
    let failed = wait_for_event(&mut rx, "tool_call_failed").await;
    match failed {
        AgentEvent::ToolCallFailed { error, .. } => {
            assert!(error.contains("alchemist"));
            assert!(error.contains("researcher"));
        }
        _ => unreachable!(),
    }

    // ...and the parent loop continues to completion.
    let completed = wait_for_event(&mut rx, "task_completed").await;
    match completed {
        AgentEvent::TaskCompleted { final_content, .. } => {
            assert_eq!(final_content, "recovered without delegation");
        }
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn model_failure_ends_task_with_failure_event() {
    // Empty script: the first generate returns a transient error.
    let orch = make_orchestrator(Vec::new(), Vec::new());
    let mut rx = orch.subscribe();

    let task = orch.create_task();
    let _ = orch.start_task(&task.id, "go").unwrap();

    let failed = wait_for_event(&mut rx, "task_failed").await;
    match failed {
        AgentEvent::TaskFailed { error, .. } => assert!(error.contains("script exhausted")),
        _ => unreachable!(),
    }
    assert_eq!(
        orch.tasks().get_task(&task.id).unwrap().status,
        TaskStatus::Failed
    );
}
