//! Error types for graph construction and execution.
//!
//! All errors implement `std::error::Error` via the `thiserror` crate. Node
//! failures carry the node id so callers can map an error back to the graph
//! position it came from.

use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced while building or running a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The graph structure is invalid (missing entry, unknown edge target,
    /// a node with both a direct and a conditional edge, ...). Raised by
    /// [`StateGraph::compile`](crate::graph::StateGraph::compile).
    #[error("Graph validation failed: {0}")]
    Validation(String),

    /// A node executor returned an error. The engine never lets a node
    /// failure escape silently; it is wrapped with the node id.
    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution {
        /// Id of the failing node.
        node: String,
        /// Underlying error description.
        error: String,
    },

    /// General execution failure: step-limit breach, a router that returned
    /// an unknown target, an unroutable node.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// An LLM capability call failed (transport error, malformed structured
    /// output, tool binding rejected).
    #[error("LLM error: {0}")]
    Llm(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Checkpoint persistence failed.
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Application-defined error propagated through the engine unchanged.
    #[error("{0}")]
    Custom(String),
}

impl GraphError {
    /// Wrap an arbitrary error as a node-execution failure.
    pub fn in_node(node: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.to_string(),
        }
    }
}
