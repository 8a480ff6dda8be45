//! Event bridge — drains the orchestrator's broadcast channel into the
//! `BroadcastManager` for per-connection delivery.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use foreman_core::events::AgentEvent;

use super::broadcast::BroadcastManager;

/// Bridges orchestrator events to connected clients.
pub struct EventBridge {
    rx: broadcast::Receiver<AgentEvent>,
    broadcast: Arc<BroadcastManager>,
}

impl EventBridge {
    /// Create a new event bridge.
    #[must_use]
    pub fn new(rx: broadcast::Receiver<AgentEvent>, broadcast: Arc<BroadcastManager>) -> Self {
        Self { rx, broadcast }
    }

    /// Run the bridge loop. Exits when the broadcast sender is dropped.
    #[tracing::instrument(skip_all, name = "event_bridge")]
    pub async fn run(mut self) {
        loop {
            match self.rx.recv().await {
                Ok(event) => {
                    self.broadcast.publish(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged = n, "event bridge lagged; frames skipped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("event bridge: sender closed, exiting");
                    break;
                }
            }
        }
    }
}
