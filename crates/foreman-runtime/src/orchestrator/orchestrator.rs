//! Orchestrator — multi-task coordinator.
//!
//! Owns the shared components (emitter, task service, interrupt controller,
//! rate limiter), assembles the supervisor tool set, and tracks one active
//! run per task under a concurrency semaphore. Each run executes as an
//! independent tokio task; cross-task state meets only in the task service
//! maps, the checkpoint store, and the broadcast channel.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use metrics::gauge;

use foreman_core::events::{AgentEvent, DialogueContent, Direction, dialogue_event};
use foreman_core::messages::Conversation;
use foreman_core::status::TaskStatus;
use foreman_tools::ask_user::AskUserTool;
use foreman_tools::delegate::DelegateTool;
use foreman_tools::registry::ToolRegistry;
use foreman_tools::status_update::UpdateStatusTool;

use crate::agent::event_emitter::EventEmitter;
use crate::agent::run_loop::run_agent;
use crate::agent::status_limit::{DEFAULT_STATUS_UPDATE_LIMIT, StatusRateLimiter};
use crate::checkpoint::CheckpointStore;
use crate::errors::RuntimeError;
use crate::interrupt::InterruptController;
use crate::orchestrator::subagents::{SubagentManager, SubagentSpec};
use crate::provider::ModelProvider;
use crate::tasks::{AgentKind, Task, TaskService};
use crate::types::{DEFAULT_MAX_TURNS, RunComponents, RunConfig};

/// Orchestrator construction parameters.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Maximum concurrent runs across all tasks.
    pub max_concurrent_runs: usize,
    /// Turn budget per run loop.
    pub max_turns: u32,
    /// Consecutive status-update limit.
    pub status_update_limit: u32,
    /// Broadcast channel capacity.
    pub emitter_capacity: usize,
    /// System prompt for supervisor agents.
    pub supervisor_prompt: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            max_turns: DEFAULT_MAX_TURNS,
            status_update_limit: DEFAULT_STATUS_UPDATE_LIMIT,
            emitter_capacity: 1024,
            supervisor_prompt: "You are the supervising agent for a task. Use your tools to \
make progress; delegate self-contained work with the task tool, and ask the \
operator only when you cannot proceed without input."
                .into(),
        }
    }
}

/// Tracks an active run within a task.
struct ActiveRun {
    agent_id: String,
    cancel: CancellationToken,
    /// RAII guard — released when the run is removed from `active_runs`.
    _permit: OwnedSemaphorePermit,
}

/// Multi-task orchestrator.
pub struct Orchestrator {
    config: OrchestratorConfig,
    components: RunComponents,
    supervisor_tools: ToolRegistry,
    /// Semaphore limiting total concurrent runs.
    run_semaphore: Arc<Semaphore>,
    /// Active runs keyed by task ID.
    active_runs: Mutex<HashMap<String, ActiveRun>>,
}

impl Orchestrator {
    /// Assemble an orchestrator.
    ///
    /// `worker_tools` is the base tool set; sub-agent specs narrow it, and
    /// the supervisor set extends it with the `task`, `ask_user`, and
    /// `update_status` built-ins.
    #[must_use]
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        worker_tools: ToolRegistry,
        subagents: Vec<SubagentSpec>,
        checkpoints: Arc<dyn CheckpointStore>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        let emitter = Arc::new(EventEmitter::with_capacity(config.emitter_capacity));
        let tasks = Arc::new(TaskService::new(emitter.clone()));
        let interrupts = Arc::new(InterruptController::new(checkpoints, emitter.clone()));
        let limiter = Arc::new(StatusRateLimiter::new(
            "update_status",
            config.status_update_limit,
        ));
        let components = RunComponents {
            provider,
            tasks: tasks.clone(),
            emitter,
            interrupts,
            limiter,
        };

        let manager = Arc::new(SubagentManager::new(
            components.clone(),
            &worker_tools,
            subagents,
            config.max_turns,
        ));
        let mut supervisor_tools = worker_tools;
        supervisor_tools.register(Arc::new(DelegateTool::new(manager)));
        supervisor_tools.register(Arc::new(AskUserTool::interactive()));
        supervisor_tools.register(Arc::new(UpdateStatusTool::new(tasks)));

        Arc::new(Self {
            run_semaphore: Arc::new(Semaphore::new(config.max_concurrent_runs)),
            config,
            components,
            supervisor_tools,
            active_runs: Mutex::new(HashMap::new()),
        })
    }

    /// The shared event emitter.
    #[must_use]
    pub fn emitter(&self) -> &Arc<EventEmitter> {
        &self.components.emitter
    }

    /// Subscribe to all orchestrator events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.components.emitter.subscribe()
    }

    /// The task/agent registry.
    #[must_use]
    pub fn tasks(&self) -> &Arc<TaskService> {
        &self.components.tasks
    }

    /// The interrupt controller.
    #[must_use]
    pub fn interrupts(&self) -> &Arc<InterruptController> {
        &self.components.interrupts
    }

    /// Create a new task.
    pub fn create_task(&self) -> Task {
        self.components.tasks.create_task()
    }

    // ── Run tracking ──

    /// Start tracking a run. Errors if the task already has an active run
    /// (`TaskBusy`) or the orchestrator is at capacity (`AtCapacity`).
    fn begin_run(&self, task_id: &str, agent_id: &str) -> Result<CancellationToken, RuntimeError> {
        let mut runs = self.active_runs.lock();
        if runs.contains_key(task_id) {
            return Err(RuntimeError::TaskBusy(task_id.to_owned()));
        }
        let permit = Arc::clone(&self.run_semaphore)
            .try_acquire_owned()
            .map_err(|_| RuntimeError::AtCapacity {
                current: runs.len(),
                max: self.config.max_concurrent_runs,
            })?;
        let cancel = CancellationToken::new();
        let _ = runs.insert(
            task_id.to_owned(),
            ActiveRun {
                agent_id: agent_id.to_owned(),
                cancel: cancel.clone(),
                _permit: permit,
            },
        );
        gauge!("foreman_runs_active").set(runs.len() as f64);
        info!(task_id, agent_id, "run started");
        Ok(cancel)
    }

    /// Stop tracking a run (releases its concurrency permit).
    fn finish_run(&self, task_id: &str) {
        debug!(task_id, "run finished");
        let mut runs = self.active_runs.lock();
        let _ = runs.remove(task_id);
        gauge!("foreman_runs_active").set(runs.len() as f64);
    }

    /// Whether a task has an active run.
    #[must_use]
    pub fn has_active_run(&self, task_id: &str) -> bool {
        self.active_runs.lock().contains_key(task_id)
    }

    /// Number of active runs.
    #[must_use]
    pub fn active_run_count(&self) -> usize {
        self.active_runs.lock().len()
    }

    /// The agent driving a task's active run, if any.
    #[must_use]
    pub fn running_agent_id(&self, task_id: &str) -> Option<String> {
        self.active_runs
            .lock()
            .get(task_id)
            .map(|run| run.agent_id.clone())
    }

    /// Cancel a task's active run. Returns true if one was cancelled.
    #[instrument(skip(self), fields(task_id))]
    pub fn abort(&self, task_id: &str) -> bool {
        let runs = self.active_runs.lock();
        if let Some(run) = runs.get(task_id) {
            warn!(task_id, "abort requested");
            run.cancel.cancel();
            true
        } else {
            false
        }
    }

    // ── Task execution ──

    /// Start a created task's supervisor run against a user prompt.
    ///
    /// Returns the supervisor's agent ID (the handle later resumes target).
    #[instrument(skip(self, prompt), fields(task_id))]
    pub fn start_task(
        self: &Arc<Self>,
        task_id: &str,
        prompt: &str,
    ) -> Result<String, RuntimeError> {
        let tasks = &self.components.tasks;
        let task = tasks
            .get_task(task_id)
            .ok_or_else(|| RuntimeError::UnknownTask(task_id.to_owned()))?;
        if task.status != TaskStatus::Created {
            return Err(RuntimeError::InvalidTransition {
                from: task.status,
                to: TaskStatus::Running,
            });
        }

        let agent = tasks.register_agent(task_id, AgentKind::Supervisor)?;
        let cancel = match self.begin_run(task_id, &agent.id) {
            Ok(c) => c,
            Err(e) => {
                tasks.remove_agent(&agent.id);
                return Err(e);
            }
        };
        tasks.set_task_status(task_id, TaskStatus::Running)?;

        let _ = self.components.emitter.emit(dialogue_event(
            task_id,
            &agent.id,
            Direction::Input,
            DialogueContent::text(prompt),
            "user",
        ));

        self.spawn_run(task_id, &agent.id, Conversation::seeded(prompt), cancel);
        Ok(agent.id)
    }

    /// Resume an interrupted (task, agent) pair with an answer.
    ///
    /// Distinct failures: `UnknownTask`, `UnknownAgent`, `TaskBusy`, and
    /// `NoPendingInterrupt` — callers retry on the ambiguous ones only.
    #[instrument(skip(self, answer), fields(task_id, agent_id))]
    pub async fn resume_task(
        self: &Arc<Self>,
        task_id: &str,
        agent_id: &str,
        answer: &str,
    ) -> Result<(), RuntimeError> {
        let tasks = &self.components.tasks;
        let _ = tasks
            .get_task(task_id)
            .ok_or_else(|| RuntimeError::UnknownTask(task_id.to_owned()))?;
        let agent = tasks
            .get_agent(agent_id)
            .ok_or_else(|| RuntimeError::UnknownAgent(agent_id.to_owned()))?;
        if agent.task_id != task_id {
            return Err(RuntimeError::UnknownAgent(agent_id.to_owned()));
        }

        // Claim the run slot before consuming the checkpoint so a failed
        // claim never loses the snapshot.
        let cancel = self.begin_run(task_id, agent_id)?;
        let conversation = match self
            .components
            .interrupts
            .resume(task_id, agent_id, answer)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                self.finish_run(task_id);
                return Err(e);
            }
        };

        if let Err(e) = tasks.set_task_status(task_id, TaskStatus::Running) {
            self.finish_run(task_id);
            return Err(e);
        }

        let _ = self.components.emitter.emit(dialogue_event(
            task_id,
            agent_id,
            Direction::Input,
            DialogueContent::text(answer),
            "user",
        ));

        self.spawn_run(task_id, agent_id, conversation, cancel);
        Ok(())
    }

    fn spawn_run(
        self: &Arc<Self>,
        task_id: &str,
        agent_id: &str,
        conversation: Conversation,
        cancel: CancellationToken,
    ) {
        let orchestrator = Arc::clone(self);
        let task_id = task_id.to_owned();
        let agent_id = agent_id.to_owned();
        let _handle = tokio::spawn(async move {
            let config = RunConfig {
                max_turns: orchestrator.config.max_turns,
                sender: "supervisor".into(),
                manage_task_status: true,
            };
            let artifacts = orchestrator.components.tasks.artifacts(&task_id);
            let outcome = run_agent(
                &orchestrator.components,
                &orchestrator.supervisor_tools,
                &task_id,
                &agent_id,
                &orchestrator.config.supervisor_prompt,
                conversation,
                &artifacts,
                &cancel,
                &config,
            )
            .await;
            debug!(task_id, agent_id, suspended = outcome.is_suspended(), "run loop returned");
            orchestrator.finish_run(&task_id);
        });
    }

    /// Graceful shutdown — cancel every active run.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        info!("orchestrator shutdown initiated");
        let runs = self.active_runs.lock();
        for run in runs.values() {
            run.cancel.cancel();
        }
    }
}
