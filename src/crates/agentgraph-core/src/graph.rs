//! Graph builder: named nodes plus direct and conditional edges.
//!
//! Build a [`StateGraph`] by adding nodes (async executors returning partial
//! updates), wiring them with `add_edge(from, to)` - using [`START`] and
//! [`END`] for entry and exit - and routing dynamically with
//! `add_conditional_edges`. `compile()` validates the structure and returns a
//! [`CompiledGraph`](crate::compiled::CompiledGraph) ready to execute.
//!
//! # Conditional edges
//!
//! A conditional edge attaches a routing function `(state) -> key` to a
//! source node. The key is looked up in a path map (`key -> node id`, with
//! [`END`] as a valid target); an unmapped key is treated as a node id
//! directly. A node has either one direct edge or conditional edges, never
//! both.
//!
//! ```rust
//! use agentgraph_core::graph::{StateGraph, END, START};
//! # use agentgraph_core::state::GraphState;
//! # #[derive(Clone, Debug, Default)]
//! # struct S { hops: usize }
//! # #[derive(Clone, Debug, Default)]
//! # struct U { hop: bool }
//! # impl GraphState for S {
//! #     type Update = U;
//! #     fn apply(&mut self, u: U) { if u.hop { self.hops += 1; } }
//! # }
//!
//! let mut graph: StateGraph<S> = StateGraph::new();
//! graph.add_node("work", |_state: S| async { Ok(U { hop: true }) });
//! graph.add_edge(START, "work");
//! graph.add_conditional_edges(
//!     "work",
//!     |state: &S| if state.hops < 3 { "work".into() } else { END.into() },
//!     [("work".into(), "work".into()), (END.into(), END.into())].into(),
//! );
//! let compiled = graph.compile().unwrap();
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::compiled::CompiledGraph;
use crate::error::{GraphError, Result};
use crate::state::GraphState;

/// Sentinel for graph entry: `add_edge(START, first_node)`.
pub const START: &str = "__start__";

/// Sentinel for graph exit: `add_edge(last_node, END)` or a conditional
/// path-map target.
pub const END: &str = "__end__";

/// Boxed future returned by a node executor.
pub type NodeFuture<U> = Pin<Box<dyn Future<Output = Result<U>> + Send>>;

/// A node: takes a snapshot of the state, returns a partial update.
pub type NodeExecutor<S> =
    Arc<dyn Fn(S) -> NodeFuture<<S as GraphState>::Update> + Send + Sync>;

/// Routing function for conditional edges: maps state to a path-map key.
pub type EdgeRouter<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// A conditional edge: router plus `key -> target` path map.
pub struct ConditionalEdge<S> {
    pub(crate) router: EdgeRouter<S>,
    pub(crate) path_map: HashMap<String, String>,
}

impl<S> Clone for ConditionalEdge<S> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            path_map: self.path_map.clone(),
        }
    }
}

/// Mutable graph under construction.
pub struct StateGraph<S: GraphState> {
    nodes: HashMap<String, NodeExecutor<S>>,
    edges: HashMap<String, String>,
    conditional: HashMap<String, ConditionalEdge<S>>,
    entry: Option<String>,
}

impl<S: GraphState> Default for StateGraph<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: GraphState> StateGraph<S> {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            conditional: HashMap::new(),
            entry: None,
        }
    }

    /// Add a node. The executor receives a clone of the current state and
    /// returns a partial update; the engine applies it through the state's
    /// reducer. Re-adding an id replaces the executor.
    pub fn add_node<F, Fut>(&mut self, id: impl Into<String>, executor: F)
    where
        F: Fn(S) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<S::Update>> + Send + 'static,
    {
        let executor: NodeExecutor<S> = Arc::new(move |state| Box::pin(executor(state)));
        self.nodes.insert(id.into(), executor);
    }

    /// Add a direct edge. `add_edge(START, n)` sets the entry point;
    /// `add_edge(n, END)` terminates after `n`.
    pub fn add_edge(&mut self, from: impl Into<String>, to: impl Into<String>) {
        let from = from.into();
        let to = to.into();
        if from == START {
            self.entry = Some(to);
        } else {
            self.edges.insert(from, to);
        }
    }

    /// Add conditional edges from `source`. At runtime the router is called
    /// with the post-merge state; its key is resolved through `path_map`
    /// (or used as a node id directly when unmapped).
    pub fn add_conditional_edges<F>(
        &mut self,
        source: impl Into<String>,
        router: F,
        path_map: HashMap<String, String>,
    ) where
        F: Fn(&S) -> String + Send + Sync + 'static,
    {
        self.conditional.insert(
            source.into(),
            ConditionalEdge {
                router: Arc::new(router),
                path_map,
            },
        );
    }

    /// Set the entry point explicitly (equivalent to `add_edge(START, node)`).
    pub fn set_entry(&mut self, node: impl Into<String>) {
        self.entry = Some(node.into());
    }

    /// Validate the graph structure.
    pub fn validate(&self) -> Result<()> {
        let entry = self
            .entry
            .as_ref()
            .ok_or_else(|| GraphError::Validation("no entry point set".into()))?;

        if !self.nodes.contains_key(entry) {
            return Err(GraphError::Validation(format!(
                "entry point '{}' is not a node",
                entry
            )));
        }

        for (from, to) in &self.edges {
            if !self.nodes.contains_key(from) {
                return Err(GraphError::Validation(format!(
                    "edge from unknown node '{}'",
                    from
                )));
            }
            if to != END && !self.nodes.contains_key(to) {
                return Err(GraphError::Validation(format!(
                    "edge from '{}' to unknown node '{}'",
                    from, to
                )));
            }
            if self.conditional.contains_key(from) {
                return Err(GraphError::Validation(format!(
                    "node '{}' has both a direct edge and conditional edges",
                    from
                )));
            }
        }

        for (source, edge) in &self.conditional {
            if !self.nodes.contains_key(source) {
                return Err(GraphError::Validation(format!(
                    "conditional edges from unknown node '{}'",
                    source
                )));
            }
            for target in edge.path_map.values() {
                if target != END && !self.nodes.contains_key(target) {
                    return Err(GraphError::Validation(format!(
                        "conditional edge from '{}' maps to unknown node '{}'",
                        source, target
                    )));
                }
            }
        }

        for id in self.nodes.keys() {
            if !self.edges.contains_key(id) && !self.conditional.contains_key(id) {
                return Err(GraphError::Validation(format!(
                    "node '{}' has no outgoing edge",
                    id
                )));
            }
        }

        Ok(())
    }

    /// Validate and produce an executable graph.
    pub fn compile(self) -> Result<CompiledGraph<S>> {
        self.validate()?;
        let Some(entry) = self.entry.clone() else {
            return Err(GraphError::Validation("no entry point set".into()));
        };
        Ok(CompiledGraph::new(
            self.nodes,
            self.edges,
            self.conditional,
            entry,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Default)]
    struct S;

    #[derive(Clone, Debug, Default)]
    struct U;

    impl GraphState for S {
        type Update = U;
        fn apply(&mut self, _update: U) {}
    }

    fn noop_graph() -> StateGraph<S> {
        let mut graph: StateGraph<S> = StateGraph::new();
        graph.add_node("a", |_s: S| async { Ok(U) });
        graph.add_node("b", |_s: S| async { Ok(U) });
        graph
    }

    #[test]
    fn test_compile_requires_entry() {
        let mut graph = noop_graph();
        graph.add_edge("a", "b");
        graph.add_edge("b", END);
        assert!(matches!(
            graph.compile(),
            Err(GraphError::Validation(msg)) if msg.contains("entry")
        ));
    }

    #[test]
    fn test_compile_rejects_unknown_edge_target() {
        let mut graph = noop_graph();
        graph.add_edge(START, "a");
        graph.add_edge("a", "missing");
        graph.add_edge("b", END);
        assert!(graph.compile().is_err());
    }

    #[test]
    fn test_compile_rejects_dual_edges() {
        let mut graph = noop_graph();
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_conditional_edges("a", |_s: &S| END.into(), HashMap::new());
        graph.add_edge("b", END);
        assert!(matches!(
            graph.compile(),
            Err(GraphError::Validation(msg)) if msg.contains("both")
        ));
    }

    #[test]
    fn test_compile_rejects_dangling_node() {
        let mut graph = noop_graph();
        graph.add_edge(START, "a");
        graph.add_edge("a", END);
        // "b" has no outgoing edge
        assert!(graph.compile().is_err());
    }

    #[test]
    fn test_valid_graph_compiles() {
        let mut graph = noop_graph();
        graph.add_edge(START, "a");
        graph.add_edge("a", "b");
        graph.add_conditional_edges(
            "b",
            |_s: &S| "done".into(),
            HashMap::from([("done".to_string(), END.to_string())]),
        );
        assert!(graph.compile().is_ok());
    }
}
