//! Error types for the supervisor runtime.
//!
//! Propagation policy: no error escapes a graph node. Workers and the
//! supervisor node map their failures into state updates (failed task steps,
//! `metadata.error`, forced FINISH); the kinds below are what the
//! *surrounding* layers - service, performance layer, sources - report.

use agentgraph_core::GraphError;
use thiserror::Error;

/// Convenience alias used throughout the supervisor crate.
pub type Result<T> = std::result::Result<T, SupervisorError>;

/// Errors produced by the supervisor runtime.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// Malformed input from the caller; surfaced as an `error` stream event.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A configured capability (cache, search, database, model) is not
    /// available. Callers degrade silently and continue.
    #[error("Capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// A worker failed while executing a step. Caught inside the worker and
    /// turned into an authored failure message plus a failed task step.
    #[error("Worker '{worker}' failed: {error}")]
    WorkerExecution {
        /// Name of the failing worker.
        worker: String,
        /// Underlying error description.
        error: String,
    },

    /// The supervisor's plan/route decision failed; forces FINISH.
    #[error("Supervisor decision failed: {0}")]
    Decision(String),

    /// Engine-level failure from the underlying graph.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// JSON (de)serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_error_is_transparent() {
        let err: SupervisorError = GraphError::Execution("bad".into()).into();
        assert_eq!(err.to_string(), "Execution failed: bad");
    }

    #[test]
    fn test_worker_error_names_worker() {
        let err = SupervisorError::WorkerExecution {
            worker: "Researcher".into(),
            error: "timeout".into(),
        };
        assert!(err.to_string().contains("Researcher"));
    }
}
