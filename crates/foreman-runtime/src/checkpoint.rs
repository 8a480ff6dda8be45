//! Interrupt checkpoints and their store.
//!
//! A [`Checkpoint`] is the minimal state needed to resume a suspended run
//! loop: the conversation snapshot and the question it is waiting on. At
//! most one live checkpoint may exist per (task, agent) pair — the store's
//! `save` is an atomic save-if-absent, and `delete` is an atomic take, so
//! interrupt and resume each act exactly once even under concurrent callers.
//!
//! Checkpoints do not expire; [`Checkpoint::age`] lets callers poll and
//! apply their own timeout policy.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use foreman_core::messages::Conversation;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// The question a suspended run loop is waiting on.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuestion {
    /// Tool call whose result the answer will become.
    pub tool_call_id: String,
    /// The question text.
    pub prompt: String,
    /// Suggested answers, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Resumable snapshot of a suspended run loop.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    /// Task the suspended agent belongs to.
    pub task_id: String,
    /// The suspended agent.
    pub agent_id: String,
    /// The outstanding question.
    pub question: PendingQuestion,
    /// Conversation snapshot, up to and including the asking tool call.
    pub conversation: Conversation,
    /// When the checkpoint was written.
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// How long this checkpoint has been waiting.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Errors from the checkpoint store.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// A checkpoint already exists for the (task, agent) pair.
    #[error("checkpoint already exists for agent {agent_id} of task {task_id}")]
    AlreadyExists {
        /// Task with the existing checkpoint.
        task_id: String,
        /// Agent with the existing checkpoint.
        agent_id: String,
    },

    /// Backend storage failure.
    #[error("checkpoint storage error: {0}")]
    Storage(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Durable storage seam for checkpoints.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Save a checkpoint. Fails with [`CheckpointError::AlreadyExists`] if a
    /// checkpoint for the same (task, agent) pair is live.
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError>;

    /// Load the live checkpoint for a (task, agent) pair, if any.
    async fn load(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointError>;

    /// Remove and return the live checkpoint for a (task, agent) pair.
    async fn delete(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointError>;
}

/// In-process checkpoint store backed by a mutex-serialized map.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    entries: Mutex<HashMap<(String, String), Checkpoint>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live checkpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), CheckpointError> {
        let key = (checkpoint.task_id.clone(), checkpoint.agent_id.clone());
        let mut entries = self.entries.lock();
        if entries.contains_key(&key) {
            return Err(CheckpointError::AlreadyExists {
                task_id: key.0,
                agent_id: key.1,
            });
        }
        let _ = entries.insert(key, checkpoint);
        Ok(())
    }

    async fn load(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let entries = self.entries.lock();
        Ok(entries
            .get(&(task_id.to_owned(), agent_id.to_owned()))
            .cloned())
    }

    async fn delete(
        &self,
        task_id: &str,
        agent_id: &str,
    ) -> Result<Option<Checkpoint>, CheckpointError> {
        let mut entries = self.entries.lock();
        Ok(entries.remove(&(task_id.to_owned(), agent_id.to_owned())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_checkpoint(task_id: &str, agent_id: &str) -> Checkpoint {
        Checkpoint {
            task_id: task_id.into(),
            agent_id: agent_id.into(),
            question: PendingQuestion {
                tool_call_id: "call_1".into(),
                prompt: "Which year?".into(),
                options: None,
            },
            conversation: Conversation::seeded("start"),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_load() {
        let store = InMemoryCheckpointStore::new();
        store.save(make_checkpoint("t1", "a1")).await.unwrap();

        let loaded = store.load("t1", "a1").await.unwrap().unwrap();
        assert_eq!(loaded.question.prompt, "Which year?");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn save_rejects_duplicate() {
        let store = InMemoryCheckpointStore::new();
        store.save(make_checkpoint("t1", "a1")).await.unwrap();

        let err = store.save(make_checkpoint("t1", "a1")).await.unwrap_err();
        assert!(matches!(err, CheckpointError::AlreadyExists { .. }));
        // The original checkpoint is untouched.
        assert!(store.load("t1", "a1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn same_agent_different_task_is_distinct() {
        let store = InMemoryCheckpointStore::new();
        store.save(make_checkpoint("t1", "a1")).await.unwrap();
        store.save(make_checkpoint("t2", "a1")).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn delete_takes_exactly_once() {
        let store = InMemoryCheckpointStore::new();
        store.save(make_checkpoint("t1", "a1")).await.unwrap();

        let taken = store.delete("t1", "a1").await.unwrap();
        assert!(taken.is_some());
        let again = store.delete("t1", "a1").await.unwrap();
        assert!(again.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn load_unknown_returns_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("t1", "a1").await.unwrap().is_none());
    }

    #[test]
    fn age_grows() {
        let cp = make_checkpoint("t1", "a1");
        assert!(cp.age() >= chrono::Duration::zero());
    }

    #[test]
    fn checkpoint_serde_roundtrip() {
        let cp = make_checkpoint("t1", "a1");
        let json = serde_json::to_string(&cp).unwrap();
        let back: Checkpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(cp, back);
    }
}
