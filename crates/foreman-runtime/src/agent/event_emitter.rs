//! Broadcast-based event emitter for `AgentEvent` dispatch.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use foreman_core::events::AgentEvent;

/// Default broadcast channel capacity.
const DEFAULT_CAPACITY: usize = 1024;

/// Broadcast-based event emitter.
///
/// Non-blocking: `emit` never awaits. Slow receivers will be dropped
/// (lagged) rather than blocking the sender.
pub struct EventEmitter {
    tx: broadcast::Sender<AgentEvent>,
    emit_count: AtomicU64,
}

impl EventEmitter {
    /// Create a new emitter with the default channel capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new emitter with a custom channel capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            emit_count: AtomicU64::new(0),
        }
    }

    /// Emit an event to all subscribers. Non-blocking.
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no active subscribers.
    pub fn emit(&self, event: AgentEvent) -> usize {
        let _ = self.emit_count.fetch_add(1, Ordering::Relaxed);
        self.tx.send(event).unwrap_or(0)
    }

    /// Subscribe to events. Returns a receiver that will receive
    /// all events emitted after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the total number of events emitted.
    #[must_use]
    pub fn emit_count(&self) -> u64 {
        self.emit_count.load(Ordering::Relaxed)
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::events::agent_status_event;
    use foreman_core::status::AgentStatus;

    fn make_event(task_id: &str) -> AgentEvent {
        agent_status_event(task_id, "a1", AgentStatus::Idle, AgentStatus::Active)
    }

    #[test]
    fn emit_with_no_subscribers() {
        let emitter = EventEmitter::new();
        let count = emitter.emit(make_event("t1"));
        assert_eq!(count, 0);
        assert_eq!(emitter.emit_count(), 1);
    }

    #[tokio::test]
    async fn emit_and_receive() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let count = emitter.emit(make_event("t1"));
        assert_eq!(count, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.base().task_id, "t1");
        assert_eq!(received.event_type(), "agent_status_changed");
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let emitter = EventEmitter::new();
        let mut rx1 = emitter.subscribe();
        let mut rx2 = emitter.subscribe();

        assert_eq!(emitter.subscriber_count(), 2);

        let count = emitter.emit(make_event("t1"));
        assert_eq!(count, 2);

        let r1 = rx1.recv().await.unwrap();
        let r2 = rx2.recv().await.unwrap();
        assert_eq!(r1.base().task_id, "t1");
        assert_eq!(r2.base().task_id, "t1");
    }

    #[tokio::test]
    async fn dropped_slow_receiver() {
        let emitter = EventEmitter::with_capacity(2);
        let mut rx = emitter.subscribe();

        // Emit 3 events into a capacity-2 channel
        let _ = emitter.emit(make_event("t1"));
        let _ = emitter.emit(make_event("t2"));
        let _ = emitter.emit(make_event("t3"));

        // Receiver should be lagged
        let result = rx.recv().await;
        assert!(result.is_err());
    }

    #[test]
    fn subscriber_count_tracks_drops() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.subscriber_count(), 0);

        let rx1 = emitter.subscribe();
        let rx2 = emitter.subscribe();
        assert_eq!(emitter.subscriber_count(), 2);

        drop(rx1);
        assert_eq!(emitter.subscriber_count(), 1);
        drop(rx2);
        assert_eq!(emitter.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn task_id_filtering() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.subscribe();

        let _ = emitter.emit(make_event("t1"));
        let _ = emitter.emit(make_event("t2"));
        let _ = emitter.emit(make_event("t1"));

        let mut t1_events = vec![];
        for _ in 0..3 {
            let event = rx.recv().await.unwrap();
            if event.base().task_id == "t1" {
                t1_events.push(event);
            }
        }
        assert_eq!(t1_events.len(), 2);
    }

    #[test]
    fn emit_count_increments() {
        let emitter = EventEmitter::new();
        assert_eq!(emitter.emit_count(), 0);
        let _ = emitter.emit(make_event("t1"));
        let _ = emitter.emit(make_event("t2"));
        assert_eq!(emitter.emit_count(), 2);
    }

    #[test]
    fn default_creates_valid_emitter() {
        let emitter = EventEmitter::default();
        assert_eq!(emitter.subscriber_count(), 0);
        assert_eq!(emitter.emit_count(), 0);
    }
}
