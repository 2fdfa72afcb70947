//! Worker registry: the catalog of specialists the supervisor routes to.
//!
//! Registration happens at startup (many readers, rare writers); each
//! request takes an immutable [`RegistrySnapshot`] once and resolves every
//! worker name against that snapshot, so registration changes mid-request
//! cannot skew a running plan.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::error::Result;
use crate::state::{StateUpdate, SupervisorState};

/// Category of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerType {
    /// Direct execution, no model involved.
    Simple,
    /// Wraps tool invocations.
    ToolBased,
    /// Runs a nested graph with its own state shape.
    Subgraph,
    /// Reasoning delegated to an LLM.
    LlmPowered,
}

impl WorkerType {
    /// The lowercase tag shown in planner-facing descriptions.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::ToolBased => "tool_based",
            Self::Subgraph => "subgraph",
            Self::LlmPowered => "llm_powered",
        }
    }
}

/// A specialist the supervisor can route to.
///
/// `description` is planner-facing text: it steers the LLM's worker choice,
/// so it should state both what the worker does and what it declines.
/// `execute` receives the current state and returns a partial update that
/// must contain at least one authored assistant message and
/// `current_worker`; see [`crate::worker`] for the standard builders.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Unique worker name.
    fn name(&self) -> &str;

    /// Planner-facing description.
    fn description(&self) -> &str;

    /// Higher priorities sort first in the formatted worker list.
    fn priority(&self) -> i32 {
        0
    }

    /// Worker category.
    fn worker_type(&self) -> WorkerType {
        WorkerType::Simple
    }

    /// Names of tools this worker uses, if any.
    fn tools(&self) -> Vec<String> {
        Vec::new()
    }

    /// Execute one step against the current state.
    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate>;
}

/// Thread-safe catalog of workers.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: RwLock<HashMap<String, Arc<dyn Worker>>>,
}

impl WorkerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker. Registering a name twice is a no-op (logged);
    /// use [`register_replace`](Self::register_replace) to swap one out.
    pub fn register(&self, worker: Arc<dyn Worker>) {
        let mut workers = self.workers.write();
        if workers.contains_key(worker.name()) {
            tracing::warn!(worker = %worker.name(), "worker already registered, skipping");
            return;
        }
        tracing::info!(
            worker = %worker.name(),
            worker_type = worker.worker_type().as_str(),
            "registered worker"
        );
        workers.insert(worker.name().to_string(), worker);
    }

    /// Register a worker, replacing any existing one with the same name.
    pub fn register_replace(&self, worker: Arc<dyn Worker>) {
        tracing::info!(worker = %worker.name(), "registered worker (replace)");
        self.workers
            .write()
            .insert(worker.name().to_string(), worker);
    }

    /// The worker registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.read().get(name).cloned()
    }

    /// Remove a worker. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.workers.write().remove(name).is_some()
    }

    /// Whether no workers are registered.
    pub fn is_empty(&self) -> bool {
        self.workers.read().is_empty()
    }

    /// Number of registered workers.
    pub fn count(&self) -> usize {
        self.workers.read().len()
    }

    /// Registry statistics for diagnostics.
    pub fn stats(&self) -> JsonValue {
        let workers = self.workers.read();
        let mut type_distribution: HashMap<&'static str, usize> = HashMap::new();
        for worker in workers.values() {
            *type_distribution
                .entry(worker.worker_type().as_str())
                .or_default() += 1;
        }

        json!({
            "total_workers": workers.len(),
            "type_distribution": type_distribution,
            "workers": workers.values().map(|w| json!({
                "name": w.name(),
                "worker_type": w.worker_type().as_str(),
                "priority": w.priority(),
                "tools_count": w.tools().len(),
            })).collect::<Vec<_>>(),
        })
    }

    /// Take an immutable snapshot for one request.
    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            workers: self.workers.read().clone(),
        }
    }
}

/// Immutable per-request view of the registry.
#[derive(Clone)]
pub struct RegistrySnapshot {
    workers: HashMap<String, Arc<dyn Worker>>,
}

impl RegistrySnapshot {
    /// The worker registered under `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Worker>> {
        self.workers.get(name).cloned()
    }

    /// Whether `name` is registered (exact match).
    pub fn contains(&self, name: &str) -> bool {
        self.workers.contains_key(name)
    }

    /// Whether the snapshot holds no workers.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Worker names sorted by priority (highest first, ties by name).
    pub fn names_by_priority(&self) -> Vec<String> {
        let mut workers: Vec<&Arc<dyn Worker>> = self.workers.values().collect();
        workers.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        workers.iter().map(|w| w.name().to_string()).collect()
    }

    /// Resolve a name exactly, then case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<String> {
        if self.workers.contains_key(name) {
            return Some(name.to_string());
        }
        let lowered = name.to_lowercase();
        self.workers
            .keys()
            .find(|registered| registered.to_lowercase() == lowered)
            .cloned()
    }

    /// The worker list shown to the planner: one line per worker,
    /// priority-sorted, `- Name [type]: description`.
    pub fn formatted_descriptions(&self) -> String {
        let mut workers: Vec<&Arc<dyn Worker>> = self.workers.values().collect();
        workers.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        workers
            .iter()
            .map(|w| {
                format!(
                    "- {} [{}]: {}",
                    w.name(),
                    w.worker_type().as_str(),
                    w.description()
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgraph_core::messages::Message;

    struct StubWorker {
        name: &'static str,
        priority: i32,
    }

    #[async_trait]
    impl Worker for StubWorker {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "stub"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn worker_type(&self) -> WorkerType {
            WorkerType::LlmPowered
        }

        async fn execute(&self, _state: &SupervisorState) -> Result<StateUpdate> {
            Ok(StateUpdate::default()
                .with_message(Message::assistant("ok").with_name(self.name)))
        }
    }

    fn stub(name: &'static str, priority: i32) -> Arc<dyn Worker> {
        Arc::new(StubWorker { name, priority })
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = WorkerRegistry::new();
        registry.register(stub("A", 1));
        registry.register(stub("A", 99));

        let snapshot = registry.snapshot();
        assert_eq!(registry.count(), 1);
        assert_eq!(snapshot.get("A").unwrap().priority(), 1);
    }

    #[test]
    fn test_register_replace_swaps() {
        let registry = WorkerRegistry::new();
        registry.register(stub("A", 1));
        registry.register_replace(stub("A", 99));
        assert_eq!(registry.snapshot().get("A").unwrap().priority(), 99);
    }

    #[test]
    fn test_names_sorted_by_priority_then_name() {
        let registry = WorkerRegistry::new();
        registry.register(stub("Writer", 5));
        registry.register(stub("Researcher", 10));
        registry.register(stub("DataAnalyst", 10));
        registry.register(stub("General", 1));

        let names = registry.snapshot().names_by_priority();
        assert_eq!(names, vec!["DataAnalyst", "Researcher", "Writer", "General"]);
    }

    #[test]
    fn test_formatted_descriptions_carry_type_tags() {
        let registry = WorkerRegistry::new();
        registry.register(stub("Researcher", 10));

        let formatted = registry.snapshot().formatted_descriptions();
        assert_eq!(formatted, "- Researcher [llm_powered]: stub");
    }

    #[test]
    fn test_resolve_case_insensitive() {
        let registry = WorkerRegistry::new();
        registry.register(stub("Researcher", 10));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.resolve("Researcher").unwrap(), "Researcher");
        assert_eq!(snapshot.resolve("researcher").unwrap(), "Researcher");
        assert!(snapshot.resolve("Unknown").is_none());
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_registrations() {
        let registry = WorkerRegistry::new();
        registry.register(stub("A", 1));
        let snapshot = registry.snapshot();

        registry.register(stub("B", 2));
        assert!(snapshot.get("B").is_none());
        assert!(registry.snapshot().get("B").is_some());
    }

    #[test]
    fn test_stats_shape() {
        let registry = WorkerRegistry::new();
        registry.register(stub("A", 1));
        registry.register(stub("B", 2));

        let stats = registry.stats();
        assert_eq!(stats["total_workers"], 2);
        assert_eq!(stats["type_distribution"]["llm_powered"], 2);
    }

    #[test]
    fn test_unregister() {
        let registry = WorkerRegistry::new();
        registry.register(stub("A", 1));
        assert!(registry.unregister("A"));
        assert!(!registry.unregister("A"));
        assert!(registry.is_empty());
    }
}
