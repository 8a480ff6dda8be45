//! Tool dispatcher — per-call pipeline and batch scheduling.
//!
//! Dispatch rules for one batch of model-issued tool calls:
//!
//! - Every call gets `tool_call_initiated` first, in issue order.
//! - Maximal runs of consecutive independent (pure) calls execute
//!   concurrently; results are merged back in issue order, not completion
//!   order, so conversation history stays deterministic.
//! - Exclusive (mutating/delegating) calls run alone, in order.
//! - Calls to the rate-limited status tool past the consecutive threshold
//!   are short-circuited into a structured `rate_limited` result without
//!   executing.
//! - The first interactive call that validates successfully suspends the
//!   batch: its result message is deferred until resume, and calls issued
//!   after it resolve to structured "not executed" results so the
//!   one-result-per-call invariant holds across suspension.

use std::time::{Duration, Instant};

use futures::future::join_all;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use foreman_core::events::{AgentEvent, BaseEvent};
use foreman_core::messages::ToolCall;
use foreman_core::tools::{
    ConcurrencyClass, ToolCallRecord, ToolCallState, ToolOutput, error_result,
};
use foreman_tools::artifacts::ArtifactMap;
use foreman_tools::registry::ToolRegistry;
use foreman_tools::traits::{AgentTool, ToolContext};

use metrics::{counter, histogram};

use crate::agent::event_emitter::EventEmitter;
use crate::agent::status_limit::{StatusRateLimiter, Verdict};
use crate::checkpoint::PendingQuestion;
use crate::tasks::TaskService;
use crate::types::{BatchOutcome, ToolExecutionResult};

/// Convert a `Duration` to milliseconds, rounding up (ceiling).
///
/// `Duration::as_millis()` truncates sub-millisecond values to 0, which makes
/// fast tools report "0ms". Any non-zero duration reports at least 1ms.
fn duration_ceil_ms(d: Duration) -> u64 {
    let micros = d.as_micros();
    if micros == 0 {
        return 0;
    }
    ((micros + 999) / 1000) as u64
}

/// Shared per-dispatch handles.
pub struct DispatchContext<'a> {
    /// Tool registry the batch dispatches against.
    pub registry: &'a ToolRegistry,
    /// Consecutive status-update limiter.
    pub limiter: &'a StatusRateLimiter,
    /// Task/agent registry (audit recording).
    pub tasks: &'a TaskService,
    /// Event fan-out.
    pub emitter: &'a EventEmitter,
    /// Shared artifact map for the task.
    pub artifacts: &'a ArtifactMap,
    /// Owning task.
    pub task_id: &'a str,
    /// Dispatching agent.
    pub agent_id: &'a str,
    /// Cancellation token of the owning run loop.
    pub cancel: &'a CancellationToken,
}

impl DispatchContext<'_> {
    fn tool_context(&self, tool_call_id: &str) -> ToolContext {
        ToolContext {
            tool_call_id: tool_call_id.to_owned(),
            task_id: self.task_id.to_owned(),
            agent_id: self.agent_id.to_owned(),
            cancellation: self.cancel.clone(),
            artifacts: self.artifacts.clone(),
        }
    }

    fn record(&self, call: &ToolCall, state: ToolCallState, result: &ToolOutput, ms: u64) {
        self.tasks.record_tool_call(
            self.task_id,
            ToolCallRecord {
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
                state,
                result: result.clone(),
                execution_time_ms: ms,
            },
        );
    }

    fn emit_terminal(&self, call: &ToolCall, result: &ToolOutput, ms: u64) {
        if result.is_error.unwrap_or(false) {
            let _ = self.emitter.emit(AgentEvent::ToolCallFailed {
                base: BaseEvent::now(self.task_id, self.agent_id),
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                error: result.content.clone(),
                execution_time_ms: ms,
            });
            self.record(call, ToolCallState::Failed, result, ms);
        } else {
            let _ = self.emitter.emit(AgentEvent::ToolCallCompleted {
                base: BaseEvent::now(self.task_id, self.agent_id),
                tool_call_id: call.id.clone(),
                tool_name: call.name.clone(),
                result: result.clone(),
                execution_time_ms: ms,
            });
            self.record(call, ToolCallState::Completed, result, ms);
        }
    }
}

/// Execute a single non-interactive tool call through the full pipeline:
/// rate-limit check → lifecycle events → execute → terminal event + audit.
#[instrument(skip_all, fields(tool_name = %tool_call.name, task_id = %ctx.task_id))]
pub async fn execute_tool(tool_call: &ToolCall, ctx: &DispatchContext<'_>) -> ToolExecutionResult {
    let start = Instant::now();

    // 1. Look up tool
    let Some(tool) = ctx.registry.get(&tool_call.name) else {
        error!(tool_name = %tool_call.name, "tool not found");
        let result = error_result(format!("Tool not found: {}", tool_call.name));
        let ms = duration_ceil_ms(start.elapsed());
        ctx.emit_terminal(tool_call, &result, ms);
        return ToolExecutionResult {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            result,
            duration_ms: ms,
        };
    };

    // 2. Consecutive status-update limit
    if ctx.limiter.check(ctx.agent_id, &tool_call.name) == Verdict::Limited {
        warn!(agent_id = %ctx.agent_id, "status update rate limit reached");
        counter!("foreman_status_updates_limited_total").increment(1);
        let result = ToolOutput {
            content: format!(
                "Status update limit reached ({} consecutive). Take a different action \
before sending another update.",
                ctx.limiter.limit()
            ),
            details: Some(serde_json::json!({
                "code": "rate_limited",
                "limit": ctx.limiter.limit(),
            })),
            is_error: None,
        };
        let ms = duration_ceil_ms(start.elapsed());
        ctx.emit_terminal(tool_call, &result, ms);
        return ToolExecutionResult {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            result,
            duration_ms: ms,
        };
    }

    // 3. Execute
    let _ = ctx.emitter.emit(AgentEvent::ToolCallExecuting {
        base: BaseEvent::now(ctx.task_id, ctx.agent_id),
        tool_call_id: tool_call.id.clone(),
        tool_name: tool_call.name.clone(),
    });
    debug!(tool_call_id = %tool_call.id, "tool execution started");

    let tool_ctx = ctx.tool_context(&tool_call.id);
    let result = if ctx.cancel.is_cancelled() {
        error_result("Operation cancelled")
    } else {
        match tool
            .execute(Value::Object(tool_call.arguments.clone()), &tool_ctx)
            .await
        {
            Ok(r) => r,
            Err(e) => error_result(e.to_string()),
        }
    };

    let ms = duration_ceil_ms(start.elapsed());
    counter!("foreman_tool_executions_total", "tool" => tool_call.name.clone()).increment(1);
    histogram!("foreman_tool_execution_duration_seconds", "tool" => tool_call.name.clone())
        .record(start.elapsed().as_secs_f64());

    // 4. Terminal event + audit
    ctx.emit_terminal(tool_call, &result, ms);
    info!(tool = %tool_call.name, duration_ms = ms, "tool executed");

    ToolExecutionResult {
        tool_call_id: tool_call.id.clone(),
        tool_name: tool_call.name.clone(),
        result,
        duration_ms: ms,
    }
}

/// Execute the interactive (clarifying-question) call.
///
/// On successful validation the pending question is returned and the call's
/// result message is deferred until resume. A validation failure resolves
/// the call like any failed tool.
async fn execute_interactive(
    tool_call: &ToolCall,
    tool: &dyn AgentTool,
    ctx: &DispatchContext<'_>,
) -> Result<PendingQuestion, ToolExecutionResult> {
    let start = Instant::now();
    let _ = ctx.emitter.emit(AgentEvent::ToolCallExecuting {
        base: BaseEvent::now(ctx.task_id, ctx.agent_id),
        tool_call_id: tool_call.id.clone(),
        tool_name: tool_call.name.clone(),
    });

    let tool_ctx = ctx.tool_context(&tool_call.id);
    let result = match tool
        .execute(Value::Object(tool_call.arguments.clone()), &tool_ctx)
        .await
    {
        Ok(r) => r,
        Err(e) => error_result(e.to_string()),
    };
    let ms = duration_ceil_ms(start.elapsed());

    if result.is_error.unwrap_or(false) {
        ctx.emit_terminal(tool_call, &result, ms);
        return Err(ToolExecutionResult {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            result,
            duration_ms: ms,
        });
    }

    let details = result.details.clone().unwrap_or_default();
    let prompt = details
        .get("prompt")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let options = details.get("options").and_then(Value::as_array).map(|arr| {
        arr.iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect::<Vec<_>>()
    });

    ctx.emit_terminal(tool_call, &result, ms);
    Ok(PendingQuestion {
        tool_call_id: tool_call.id.clone(),
        prompt,
        options,
    })
}

fn is_interactive(registry: &ToolRegistry, call: &ToolCall) -> bool {
    registry
        .get(&call.name)
        .is_some_and(|t| t.is_interactive() && t.stops_turn())
}

fn concurrency_of(registry: &ToolRegistry, call: &ToolCall) -> ConcurrencyClass {
    registry
        .get(&call.name)
        .map_or(ConcurrencyClass::Exclusive, |t| t.concurrency())
}

/// Dispatch one batch of tool calls.
#[instrument(skip_all, fields(task_id = %ctx.task_id, calls = tool_calls.len()))]
pub async fn dispatch_batch(
    tool_calls: &[ToolCall],
    ctx: &DispatchContext<'_>,
) -> BatchOutcome {
    // Every call is initiated up front, in issue order.
    for call in tool_calls {
        let _ = ctx.emitter.emit(AgentEvent::ToolCallInitiated {
            base: BaseEvent::now(ctx.task_id, ctx.agent_id),
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        });
    }

    let mut outcome = BatchOutcome::default();
    let mut i = 0;
    while i < tool_calls.len() {
        // Once suspended, remaining calls are resolved without executing.
        if outcome.pending.is_some() {
            for call in &tool_calls[i..] {
                let result = error_result(
                    "Not executed: the run suspended awaiting user input before this call \
was dispatched. Re-issue it after the resume if still needed.",
                );
                ctx.emit_terminal(call, &result, 0);
                outcome.results.push(ToolExecutionResult {
                    tool_call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    result,
                    duration_ms: 0,
                });
            }
            break;
        }

        let call = &tool_calls[i];

        if let Some(tool) = ctx.registry.get(&call.name)
            && tool.is_interactive()
            && tool.stops_turn()
        {
            let _ = ctx.limiter.check(ctx.agent_id, &call.name);
            match execute_interactive(call, tool.as_ref(), ctx).await {
                Ok(question) => outcome.pending = Some(question),
                Err(failed) => outcome.results.push(failed),
            }
            i += 1;
            continue;
        }

        if concurrency_of(ctx.registry, call) == ConcurrencyClass::Independent {
            // Maximal run of consecutive independent, non-interactive calls.
            let mut j = i;
            while j < tool_calls.len()
                && !is_interactive(ctx.registry, &tool_calls[j])
                && concurrency_of(ctx.registry, &tool_calls[j]) == ConcurrencyClass::Independent
            {
                j += 1;
            }
            let group = &tool_calls[i..j];
            debug!(group_size = group.len(), "dispatching independent group");
            // join_all preserves input order, so results merge in issue order
            // regardless of completion order.
            let results = join_all(group.iter().map(|c| execute_tool(c, ctx))).await;
            outcome.results.extend(results);
            i = j;
        } else {
            outcome.results.push(execute_tool(call, ctx).await);
            i += 1;
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use foreman_core::tools::{Tool, ToolKind, ToolParameterSchema, text_result};
    use foreman_tools::ask_user::AskUserTool;
    use foreman_tools::errors::ToolError;
    use foreman_tools::status_update::UpdateStatusTool;

    // ── Test tools ──

    /// Pure tool that sleeps for `delay_ms` then echoes its marker.
    struct SlowEcho;

    #[async_trait]
    impl AgentTool for SlowEcho {
        fn name(&self) -> &str {
            "slow_echo"
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Pure
        }
        fn definition(&self) -> Tool {
            Tool {
                name: "slow_echo".into(),
                description: "Echoes after a delay".into(),
                parameters: ToolParameterSchema::object(serde_json::Map::new(), Vec::new()),
            }
        }
        async fn execute(
            &self,
            params: Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            let delay = params.get("delayMs").and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let marker = params
                .get("marker")
                .and_then(Value::as_str)
                .unwrap_or("?")
                .to_owned();
            Ok(text_result(marker, false))
        }
    }

    /// Mutating tool that appends its marker to the shared artifact map.
    struct AppendArtifact;

    #[async_trait]
    impl AgentTool for AppendArtifact {
        fn name(&self) -> &str {
            "append_artifact"
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Mutating
        }
        fn definition(&self) -> Tool {
            Tool {
                name: "append_artifact".into(),
                description: "Writes an artifact".into(),
                parameters: ToolParameterSchema::object(serde_json::Map::new(), Vec::new()),
            }
        }
        async fn execute(&self, params: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            let path = params
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("out.txt");
            ctx.artifacts.insert(path, "written");
            Ok(text_result(format!("wrote {path}"), false))
        }
    }

    /// Tool whose body always fails.
    struct Exploding;

    #[async_trait]
    impl AgentTool for Exploding {
        fn name(&self) -> &str {
            "exploding"
        }
        fn kind(&self) -> ToolKind {
            ToolKind::Pure
        }
        fn definition(&self) -> Tool {
            Tool {
                name: "exploding".into(),
                description: "Always fails".into(),
                parameters: ToolParameterSchema::object(serde_json::Map::new(), Vec::new()),
            }
        }
        async fn execute(
            &self,
            _params: Value,
            _ctx: &ToolContext,
        ) -> Result<ToolOutput, ToolError> {
            Err(ToolError::Internal {
                message: "kaboom".into(),
            })
        }
    }

    struct Fixture {
        registry: ToolRegistry,
        limiter: StatusRateLimiter,
        tasks: Arc<TaskService>,
        emitter: Arc<EventEmitter>,
        artifacts: ArtifactMap,
        cancel: CancellationToken,
        task_id: String,
    }

    fn make_fixture() -> Fixture {
        let emitter = Arc::new(EventEmitter::new());
        let tasks = Arc::new(TaskService::new(emitter.clone()));
        let task = tasks.create_task();

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(SlowEcho));
        registry.register(Arc::new(AppendArtifact));
        registry.register(Arc::new(Exploding));
        registry.register(Arc::new(AskUserTool::interactive()));
        registry.register(Arc::new(UpdateStatusTool::new(tasks.clone())));

        Fixture {
            registry,
            limiter: StatusRateLimiter::new("update_status", 2),
            tasks,
            emitter,
            artifacts: ArtifactMap::new(),
            cancel: CancellationToken::new(),
            task_id: task.id,
        }
    }

    impl Fixture {
        fn ctx(&self) -> DispatchContext<'_> {
            DispatchContext {
                registry: &self.registry,
                limiter: &self.limiter,
                tasks: self.tasks.as_ref(),
                emitter: self.emitter.as_ref(),
                artifacts: &self.artifacts,
                task_id: &self.task_id,
                agent_id: "agent_1",
                cancel: &self.cancel,
            }
        }
    }

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new(name, args.as_object().cloned().unwrap_or_default())
    }

    #[tokio::test]
    async fn results_merge_in_issue_order_not_completion_order() {
        let fixture = make_fixture();
        let calls = vec![
            call("slow_echo", json!({"marker": "first", "delayMs": 40})),
            call("slow_echo", json!({"marker": "second", "delayMs": 1})),
            call("slow_echo", json!({"marker": "third", "delayMs": 15})),
        ];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        assert!(outcome.pending.is_none());
        let markers: Vec<&str> = outcome
            .results
            .iter()
            .map(|r| r.result.content.as_str())
            .collect();
        assert_eq!(markers, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn exactly_one_result_per_call() {
        let fixture = make_fixture();
        let calls = vec![
            call("slow_echo", json!({"marker": "a"})),
            call("append_artifact", json!({"path": "x.txt"})),
            call("exploding", json!({})),
            call("slow_echo", json!({"marker": "b"})),
        ];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        assert_eq!(outcome.results.len(), 4);
        for (expected, actual) in calls.iter().zip(&outcome.results) {
            assert_eq!(expected.id, actual.tool_call_id);
        }
    }

    #[tokio::test]
    async fn tool_error_becomes_failed_result() {
        let fixture = make_fixture();
        let calls = vec![call("exploding", json!({}))];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        let result = &outcome.results[0];
        assert_eq!(result.result.is_error, Some(true));
        assert!(result.result.content.contains("kaboom"));

        // Audit retains a terminal Failed record.
        let history = fixture.tasks.tool_history(&fixture.task_id);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].state, ToolCallState::Failed);
    }

    #[tokio::test]
    async fn unknown_tool_is_failed_result_not_panic() {
        let fixture = make_fixture();
        let calls = vec![call("no_such_tool", json!({}))];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        assert_eq!(outcome.results[0].result.is_error, Some(true));
        assert!(outcome.results[0].result.content.contains("Tool not found"));
    }

    #[tokio::test]
    async fn lifecycle_events_per_call() {
        let fixture = make_fixture();
        let mut rx = fixture.emitter.subscribe();
        let calls = vec![call("slow_echo", json!({"marker": "a"}))];

        let _ = dispatch_batch(&calls, &fixture.ctx()).await;

        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type().to_owned());
        }
        assert_eq!(
            types,
            vec![
                "tool_call_initiated",
                "tool_call_executing",
                "tool_call_completed"
            ]
        );
    }

    #[tokio::test]
    async fn third_consecutive_status_update_is_limited() {
        let fixture = make_fixture();
        let ctx = fixture.ctx();

        let first = dispatch_batch(&[call("update_status", json!({"note": "1"}))], &ctx).await;
        let second = dispatch_batch(&[call("update_status", json!({"note": "2"}))], &ctx).await;
        let third = dispatch_batch(&[call("update_status", json!({"note": "3"}))], &ctx).await;

        assert!(first.results[0].result.is_error.is_none());
        assert!(second.results[0].result.is_error.is_none());
        // Third is rejected with a structured (non-error) result.
        let limited = &third.results[0].result;
        assert!(limited.is_error.is_none());
        assert_eq!(limited.details.as_ref().unwrap()["code"], "rate_limited");
        assert!(limited.content.contains("limit reached"));

        // A different tool resets the counter; updates flow again.
        let _ = dispatch_batch(&[call("slow_echo", json!({"marker": "work"}))], &ctx).await;
        assert_eq!(fixture.limiter.consecutive("agent_1"), 0);
        let fourth = dispatch_batch(&[call("update_status", json!({"note": "4"}))], &ctx).await;
        assert!(fourth.results[0].result.is_error.is_none());
        assert!(fourth.results[0].result.content.contains("recorded"));
    }

    #[tokio::test]
    async fn interactive_call_suspends_batch() {
        let fixture = make_fixture();
        let calls = vec![
            call("slow_echo", json!({"marker": "before"})),
            call("ask_user", json!({"prompt": "Which year?"})),
            call("slow_echo", json!({"marker": "after"})),
        ];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;

        let pending = outcome.pending.unwrap();
        assert_eq!(pending.prompt, "Which year?");
        assert_eq!(pending.tool_call_id, calls[1].id);

        // The call before executed; the call after resolved as not-executed.
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].result.content, "before");
        assert_eq!(outcome.results[1].result.is_error, Some(true));
        assert!(outcome.results[1].result.content.contains("Not executed"));
    }

    #[tokio::test]
    async fn invalid_question_does_not_suspend() {
        let fixture = make_fixture();
        let calls = vec![
            call("ask_user", json!({})),
            call("slow_echo", json!({"marker": "still_runs"})),
        ];

        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        assert!(outcome.pending.is_none());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[0].result.is_error, Some(true));
        assert_eq!(outcome.results[1].result.content, "still_runs");
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_execution() {
        let fixture = make_fixture();
        fixture.cancel.cancel();
        let calls = vec![call("slow_echo", json!({"marker": "a", "delayMs": 500}))];

        let start = Instant::now();
        let outcome = dispatch_batch(&calls, &fixture.ctx()).await;
        assert!(start.elapsed() < Duration::from_millis(200));
        assert_eq!(outcome.results[0].result.is_error, Some(true));
        assert!(outcome.results[0].result.content.contains("cancelled"));
    }

    #[tokio::test]
    async fn mutating_tool_writes_shared_artifacts() {
        let fixture = make_fixture();
        let calls = vec![call("append_artifact", json!({"path": "report.md"}))];
        let _ = dispatch_batch(&calls, &fixture.ctx()).await;
        assert_eq!(
            fixture.artifacts.get("report.md").as_deref(),
            Some("written")
        );
    }

    #[test]
    fn duration_ceil_rounds_up() {
        assert_eq!(duration_ceil_ms(Duration::ZERO), 0);
        assert_eq!(duration_ceil_ms(Duration::from_micros(1)), 1);
        assert_eq!(duration_ceil_ms(Duration::from_micros(999)), 1);
        assert_eq!(duration_ceil_ms(Duration::from_micros(1001)), 2);
        assert_eq!(duration_ceil_ms(Duration::from_millis(5)), 5);
    }
}
