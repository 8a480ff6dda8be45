//! WebSocket client connection state.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

/// What a connection is subscribed to. Fixed at subscribe time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionScope {
    /// Events of one task.
    Task(String),
    /// Events of every task (debug/monitoring use).
    AllTasks,
}

impl ConnectionScope {
    /// Whether an event for `task_id` falls inside this scope.
    #[must_use]
    pub fn matches(&self, task_id: &str) -> bool {
        match self {
            Self::Task(subscribed) => subscribed == task_id,
            Self::AllTasks => true,
        }
    }
}

/// Represents a connected observer.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Subscription scope.
    scope: ConnectionScope,
    /// Send channel to the connection's write task.
    tx: mpsc::Sender<Arc<String>>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of frames dropped due to a full channel.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection.
    #[must_use]
    pub fn new(id: String, scope: ConnectionScope, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id,
            scope,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// The connection's subscription scope.
    #[must_use]
    pub fn scope(&self) -> &ConnectionScope {
        &self.scope
    }

    /// Send a serialized frame to the connection.
    ///
    /// Returns `false` if the channel is full or closed, and increments
    /// the dropped frame counter.
    pub fn send(&self, frame: Arc<String>) -> bool {
        if self.tx.try_send(frame).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Total frames dropped for this connection.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
