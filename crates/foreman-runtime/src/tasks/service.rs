//! In-memory task and agent registry.
//!
//! The single owner of task and agent records for the process. Every status
//! transition flows through here so the one-event-per-transition invariant
//! has a single enforcement point. Map mutations are serialized behind
//! mutexes; none are held across await points.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use foreman_core::events::{
    AgentEvent, BaseEvent, DialogueContent, Direction, agent_status_event, dialogue_event,
};
use foreman_core::status::{AgentStatus, TaskStatus};
use foreman_core::tools::ToolCallRecord;
use foreman_tools::artifacts::ArtifactMap;
use foreman_tools::errors::ToolError;
use foreman_tools::traits::{ProgressSink, ProgressUpdate};

use crate::agent::event_emitter::EventEmitter;
use crate::errors::RuntimeError;
use crate::tasks::types::{AgentKind, AgentRecord, Task};

/// In-memory registry of tasks, agents, artifacts, and tool-call history.
pub struct TaskService {
    emitter: Arc<EventEmitter>,
    tasks: Mutex<HashMap<String, Task>>,
    agents: Mutex<HashMap<String, AgentRecord>>,
    artifacts: Mutex<HashMap<String, ArtifactMap>>,
    audit: Mutex<HashMap<String, Vec<ToolCallRecord>>>,
}

impl TaskService {
    /// Create an empty service publishing through the given emitter.
    #[must_use]
    pub fn new(emitter: Arc<EventEmitter>) -> Self {
        Self {
            emitter,
            tasks: Mutex::new(HashMap::new()),
            agents: Mutex::new(HashMap::new()),
            artifacts: Mutex::new(HashMap::new()),
            audit: Mutex::new(HashMap::new()),
        }
    }

    // ── Tasks ──

    /// Create a new task in the `Created` state.
    #[instrument(skip(self))]
    pub fn create_task(&self) -> Task {
        let task = Task::new();
        info!(task_id = %task.id, "task created");
        let _ = self.tasks.lock().insert(task.id.clone(), task.clone());
        metrics::gauge!("foreman_tasks").increment(1.0);
        task
    }

    /// Get a task by ID.
    #[must_use]
    pub fn get_task(&self, task_id: &str) -> Option<Task> {
        self.tasks.lock().get(task_id).cloned()
    }

    /// Number of tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Transition a task's status, emitting exactly one event.
    ///
    /// The emitting agent is the task's supervisor when known.
    pub fn set_task_status(&self, task_id: &str, next: TaskStatus) -> Result<(), RuntimeError> {
        let (old, agent_id) = {
            let mut tasks = self.tasks.lock();
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| RuntimeError::UnknownTask(task_id.to_owned()))?;
            let old = task.status;
            if old == next {
                return Ok(());
            }
            if !old.can_transition(next) {
                return Err(RuntimeError::InvalidTransition { from: old, to: next });
            }
            task.status = next;
            (old, task.supervisor_id.clone().unwrap_or_default())
        };
        debug!(task_id, %old, %next, "task status changed");
        let _ = self.emitter.emit(AgentEvent::TaskStatusChanged {
            base: BaseEvent::now(task_id, agent_id),
            old_status: old,
            new_status: next,
        });
        Ok(())
    }

    /// Update a task's phase/progress record. No event — the status-update
    /// tool's dialogue broadcast is the observable side.
    pub fn update_progress(
        &self,
        task_id: &str,
        phase: Option<String>,
        progress: Option<u8>,
    ) -> Result<(), RuntimeError> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| RuntimeError::UnknownTask(task_id.to_owned()))?;
        if let Some(phase) = phase {
            task.phase = Some(phase);
        }
        if let Some(progress) = progress {
            task.progress = progress.min(100);
        }
        Ok(())
    }

    // ── Agents ──

    /// Register a new agent for a task. A supervisor registration also
    /// records itself on the task.
    pub fn register_agent(
        &self,
        task_id: &str,
        kind: AgentKind,
    ) -> Result<AgentRecord, RuntimeError> {
        let record = AgentRecord::new(task_id, kind);
        {
            let mut tasks = self.tasks.lock();
            let task = tasks
                .get_mut(task_id)
                .ok_or_else(|| RuntimeError::UnknownTask(task_id.to_owned()))?;
            if kind == AgentKind::Supervisor {
                task.supervisor_id = Some(record.id.clone());
            }
        }
        debug!(task_id, agent_id = %record.id, kind = %kind, "agent registered");
        let _ = self
            .agents
            .lock()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    /// Get an agent by ID.
    #[must_use]
    pub fn get_agent(&self, agent_id: &str) -> Option<AgentRecord> {
        self.agents.lock().get(agent_id).cloned()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn agent_count(&self) -> usize {
        self.agents.lock().len()
    }

    /// Transition an agent's status, emitting exactly one event per change.
    ///
    /// Setting the current status again is a no-op (`processing`/`typing`
    /// are re-entrant) and emits nothing.
    pub fn set_agent_status(&self, agent_id: &str, next: AgentStatus) {
        let changed = {
            let mut agents = self.agents.lock();
            let Some(agent) = agents.get_mut(agent_id) else {
                warn!(agent_id, "status change for unknown agent dropped");
                return;
            };
            let old = agent.status;
            if old == next {
                None
            } else {
                agent.status = next;
                Some((agent.task_id.clone(), old))
            }
        };
        if let Some((task_id, old)) = changed {
            let _ = self
                .emitter
                .emit(agent_status_event(&task_id, agent_id, old, next));
        }
    }

    /// Remove an agent record (its run loop ended).
    pub fn remove_agent(&self, agent_id: &str) {
        let _ = self.agents.lock().remove(agent_id);
    }

    // ── Artifacts ──

    /// The shared artifact map for a task (created on first use).
    #[must_use]
    pub fn artifacts(&self, task_id: &str) -> ArtifactMap {
        self.artifacts
            .lock()
            .entry(task_id.to_owned())
            .or_default()
            .clone()
    }

    // ── Tool-call audit history ──

    /// Retain the terminal record of a tool call.
    pub fn record_tool_call(&self, task_id: &str, record: ToolCallRecord) {
        self.audit
            .lock()
            .entry(task_id.to_owned())
            .or_default()
            .push(record);
    }

    /// Tool-call history for a task, in execution order.
    #[must_use]
    pub fn tool_history(&self, task_id: &str) -> Vec<ToolCallRecord> {
        self.audit
            .lock()
            .get(task_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ProgressSink for TaskService {
    async fn report(
        &self,
        task_id: &str,
        agent_id: &str,
        update: ProgressUpdate,
    ) -> Result<(), ToolError> {
        self.update_progress(task_id, update.phase.clone(), update.progress)
            .map_err(|e| ToolError::Internal {
                message: e.to_string(),
            })?;
        let payload = serde_json::to_value(&update).unwrap_or_default();
        let _ = self.emitter.emit(dialogue_event(
            task_id,
            agent_id,
            Direction::Output,
            DialogueContent::json(payload),
            agent_id,
        ));
        Ok(())
    }
}
