//! Checkpoint persistence keyed by thread id.
//!
//! A [`Checkpointer`] stores one state snapshot per conversation thread.
//! Snapshots travel as `serde_json::Value` so the trait stays object-safe and
//! backend implementations (memory, Redis, SQL) need no knowledge of the
//! application's state type. [`InMemoryCheckpointSaver`] is the reference
//! implementation used in tests and single-process deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::RwLock;

use crate::error::Result;

/// Per-thread state persistence.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Persist the snapshot for `thread_id`, replacing any previous one.
    async fn save(&self, thread_id: &str, state: JsonValue) -> Result<()>;

    /// Load the latest snapshot for `thread_id`.
    async fn load(&self, thread_id: &str) -> Result<Option<JsonValue>>;
}

/// In-memory checkpointer. Snapshots live for the lifetime of the process.
#[derive(Default)]
pub struct InMemoryCheckpointSaver {
    threads: RwLock<HashMap<String, JsonValue>>,
}

impl InMemoryCheckpointSaver {
    /// Create an empty saver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with a stored snapshot.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointSaver {
    async fn save(&self, thread_id: &str, state: JsonValue) -> Result<()> {
        self.threads
            .write()
            .await
            .insert(thread_id.to_string(), state);
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<JsonValue>> {
        Ok(self.threads.read().await.get(thread_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let saver = InMemoryCheckpointSaver::new();
        saver
            .save("thread-1", json!({"iteration_count": 3}))
            .await
            .unwrap();

        let loaded = saver.load("thread-1").await.unwrap().unwrap();
        assert_eq!(loaded["iteration_count"], 3);
    }

    #[tokio::test]
    async fn test_load_missing_thread_is_none() {
        let saver = InMemoryCheckpointSaver::new();
        assert!(saver.load("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_snapshot() {
        let saver = InMemoryCheckpointSaver::new();
        saver.save("t", json!({"v": 1})).await.unwrap();
        saver.save("t", json!({"v": 2})).await.unwrap();

        let loaded = saver.load("t").await.unwrap().unwrap();
        assert_eq!(loaded["v"], 2);
        assert_eq!(saver.thread_count().await, 1);
    }
}
