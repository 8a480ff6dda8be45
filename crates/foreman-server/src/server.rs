//! Thin axum shell over the orchestrator.
//!
//! Three routes: `GET /health`, the per-task subscribe endpoint `GET /ws`
//! (optionally `?task=<id>`; omit for the all-tasks debug scope), and the
//! resume endpoint `POST /resume`. Resume failures map to distinct error
//! codes so callers can tell a retryable rejection from a wrong address.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use foreman_runtime::errors::RuntimeError;
use foreman_runtime::orchestrator::Orchestrator;

use crate::config::ServerConfig;
use crate::websocket::{BroadcastManager, ClientConnection, ConnectionScope, EventBridge};

/// Initialize tracing from `RUST_LOG` (default `info`). Idempotent.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Shared state behind every route.
pub struct AppState {
    /// The orchestration core.
    pub orchestrator: Arc<Orchestrator>,
    /// Connection registry / fan-out.
    pub broadcast: Arc<BroadcastManager>,
    /// Server settings.
    pub config: ServerConfig,
}

/// Build the application state and start the event bridge.
#[must_use]
pub fn build_state(orchestrator: Arc<Orchestrator>, config: ServerConfig) -> Arc<AppState> {
    let broadcast = Arc::new(BroadcastManager::new());
    let bridge = EventBridge::new(orchestrator.subscribe(), broadcast.clone());
    let _bridge_task = tokio::spawn(bridge.run());
    Arc::new(AppState {
        orchestrator,
        broadcast,
        config,
    })
}

/// Build the router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/resume", post(resume))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(
    orchestrator: Arc<Orchestrator>,
    config: ServerConfig,
) -> Result<(), std::io::Error> {
    let bind_addr = config.bind_addr;
    let state = build_state(orchestrator, config);
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(%bind_addr, "server listening");
    axum::serve(listener, app).await
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "tasks": state.orchestrator.tasks().task_count(),
        "activeRuns": state.orchestrator.active_run_count(),
        "connections": state.broadcast.connection_count(),
    }))
}

#[derive(Debug, Deserialize)]
struct SubscribeParams {
    /// Task to subscribe to; absent means the all-tasks debug scope.
    task: Option<String>,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<SubscribeParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_loop(socket, state, params.task))
}

/// Per-connection loop: forward broadcast frames out, discard any inbound
/// frames (subscriptions are read-only), clean up on either side closing.
async fn client_loop(socket: WebSocket, state: Arc<AppState>, task: Option<String>) {
    let scope = task.map_or(ConnectionScope::AllTasks, ConnectionScope::Task);
    let (tx, mut frames) = mpsc::channel::<Arc<String>>(state.config.connection_buffer);
    let connection = Arc::new(ClientConnection::new(
        foreman_core::ids::connection_id(),
        scope,
        tx,
    ));
    let connection_id = connection.id.clone();
    info!(conn_id = %connection_id, "client connected");
    state.broadcast.add(connection).await;

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            frame = frames.recv() => match frame {
                Some(json) => {
                    if sink.send(Message::Text(json.as_str().into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(other)) => {
                    debug!(conn_id = %connection_id, "ignoring inbound frame: {other:?}");
                }
            },
        }
    }

    state.broadcast.remove(&connection_id).await;
    info!(conn_id = %connection_id, "client disconnected");
}

/// Resume request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResumeRequest {
    task_id: String,
    agent_id: String,
    answer: String,
}

async fn resume(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResumeRequest>,
) -> (StatusCode, Json<Value>) {
    match state
        .orchestrator
        .resume_task(&request.task_id, &request.agent_id, &request.answer)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "resumed",
                "taskId": request.task_id,
                "agentId": request.agent_id,
            })),
        ),
        Err(e) => {
            let status = resume_status(&e);
            (
                status,
                Json(json!({
                    "error": {
                        "code": e.category(),
                        "message": e.to_string(),
                    }
                })),
            )
        }
    }
}

/// Map resume failures to distinct HTTP statuses: wrong address (404),
/// retryable protocol rejections (409), everything else (500).
fn resume_status(error: &RuntimeError) -> StatusCode {
    match error {
        RuntimeError::UnknownTask(_) | RuntimeError::UnknownAgent(_) => StatusCode::NOT_FOUND,
        RuntimeError::NoPendingInterrupt { .. }
        | RuntimeError::TaskBusy(_)
        | RuntimeError::AlreadyInterrupted { .. }
        | RuntimeError::AtCapacity { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
