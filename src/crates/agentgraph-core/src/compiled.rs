//! Compiled graph execution: run to completion or stream per-node updates.
//!
//! Execution is single-threaded cooperative per request: exactly one node
//! runs at a time, and the host scheduler may interleave other work only at
//! the nodes' own suspension points. The updates stream emits
//! `(node, partial update)` after every node completes and *before* routing;
//! when the consumer drops the stream the driver stops after the current
//! node - no node is preempted mid-call.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{GraphError, Result};
use crate::graph::{ConditionalEdge, NodeExecutor, END};
use crate::state::GraphState;

/// Engine backstop against cyclic graphs that never route to `END`. The
/// application's own termination logic should fire long before this.
pub const DEFAULT_STEP_LIMIT: usize = 64;

/// A node's partial update, emitted on the updates stream before routing.
#[derive(Debug, Clone)]
pub struct NodeUpdate<U> {
    /// Id of the node that produced the update.
    pub node: String,
    /// The partial update, exactly as returned by the node.
    pub update: U,
}

/// Stream of per-node updates for one request.
pub type UpdateStream<S> =
    ReceiverStream<Result<NodeUpdate<<S as GraphState>::Update>>>;

/// An executable graph produced by
/// [`StateGraph::compile`](crate::graph::StateGraph::compile).
pub struct CompiledGraph<S: GraphState> {
    nodes: HashMap<String, NodeExecutor<S>>,
    edges: HashMap<String, String>,
    conditional: HashMap<String, ConditionalEdge<S>>,
    entry: String,
    step_limit: usize,
}

impl<S: GraphState> Clone for CompiledGraph<S> {
    fn clone(&self) -> Self {
        Self {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
            conditional: self.conditional.clone(),
            entry: self.entry.clone(),
            step_limit: self.step_limit,
        }
    }
}

impl<S: GraphState> CompiledGraph<S> {
    pub(crate) fn new(
        nodes: HashMap<String, NodeExecutor<S>>,
        edges: HashMap<String, String>,
        conditional: HashMap<String, ConditionalEdge<S>>,
        entry: String,
    ) -> Self {
        Self {
            nodes,
            edges,
            conditional,
            entry,
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }

    /// Override the engine step limit.
    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    /// Id of the entry node.
    pub fn entry(&self) -> &str {
        &self.entry
    }

    /// Resolve the node after `current`, or `None` for `END`.
    fn route(&self, current: &str, state: &S) -> Result<Option<String>> {
        if let Some(to) = self.edges.get(current) {
            return if to == END {
                Ok(None)
            } else {
                Ok(Some(to.clone()))
            };
        }

        if let Some(edge) = self.conditional.get(current) {
            let key = (edge.router)(state);
            let target = edge.path_map.get(&key).cloned().unwrap_or(key);
            if target == END {
                return Ok(None);
            }
            if self.nodes.contains_key(&target) {
                return Ok(Some(target));
            }
            return Err(GraphError::Execution(format!(
                "conditional edge from '{}' routed to unknown node '{}'",
                current, target
            )));
        }

        Err(GraphError::Execution(format!(
            "node '{}' has no outgoing edge",
            current
        )))
    }

    async fn run_node(&self, id: &str, state: S) -> Result<S::Update> {
        let executor = self
            .nodes
            .get(id)
            .ok_or_else(|| GraphError::Execution(format!("unknown node '{}'", id)))?;
        executor(state)
            .await
            .map_err(|e| GraphError::in_node(id, e))
    }

    /// Execute the graph to completion and return the final state.
    #[tracing::instrument(skip(self, initial), fields(entry = %self.entry))]
    pub async fn invoke(&self, initial: S) -> Result<S> {
        let mut state = initial;
        let mut current = self.entry.clone();
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > self.step_limit {
                return Err(GraphError::Execution(format!(
                    "step limit {} exceeded",
                    self.step_limit
                )));
            }

            tracing::debug!(node = %current, step = steps, "executing node");
            let update = self.run_node(&current, state.clone()).await?;
            state.apply(update);

            match self.route(&current, &state)? {
                Some(next) => current = next,
                None => return Ok(state),
            }
        }
    }

    /// Execute the graph while streaming each node's partial update.
    ///
    /// Updates are emitted after the node completes and its update has been
    /// merged, before the next node is chosen. A node failure (or a routing
    /// failure) terminates the stream with a single `Err` item. If the
    /// consumer drops the stream, the driver aborts after the in-flight node
    /// finishes.
    pub fn stream_updates(&self, initial: S) -> UpdateStream<S> {
        let (tx, rx) = mpsc::channel(32);
        let graph = self.clone();

        tokio::spawn(async move {
            let mut state = initial;
            let mut current = graph.entry.clone();
            let mut steps = 0usize;

            loop {
                steps += 1;
                if steps > graph.step_limit {
                    let _ = tx
                        .send(Err(GraphError::Execution(format!(
                            "step limit {} exceeded",
                            graph.step_limit
                        ))))
                        .await;
                    return;
                }

                let update = match graph.run_node(&current, state.clone()).await {
                    Ok(update) => update,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                state.apply(update.clone());

                if tx
                    .send(Ok(NodeUpdate {
                        node: current.clone(),
                        update,
                    }))
                    .await
                    .is_err()
                {
                    // Consumer is gone; stop cooperatively.
                    tracing::debug!(node = %current, "update stream dropped, aborting");
                    return;
                }

                match graph.route(&current, &state) {
                    Ok(Some(next)) => current = next,
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        ReceiverStream::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, START};
    use futures::StreamExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Clone, Debug, Default)]
    struct LoopState {
        hops: usize,
        trace: Vec<String>,
    }

    #[derive(Clone, Debug)]
    struct LoopUpdate {
        label: String,
    }

    impl GraphState for LoopState {
        type Update = LoopUpdate;

        fn apply(&mut self, update: LoopUpdate) {
            self.hops += 1;
            self.trace.push(update.label);
        }
    }

    fn looping_graph(rounds: usize) -> CompiledGraph<LoopState> {
        let mut graph: StateGraph<LoopState> = StateGraph::new();
        graph.add_node("work", |_s: LoopState| async {
            Ok(LoopUpdate {
                label: "work".into(),
            })
        });
        graph.add_node("wrap", |_s: LoopState| async {
            Ok(LoopUpdate {
                label: "wrap".into(),
            })
        });
        graph.add_edge(START, "work");
        graph.add_conditional_edges(
            "work",
            move |state: &LoopState| {
                if state.hops < rounds {
                    "work".to_string()
                } else {
                    "wrap".to_string()
                }
            },
            HashMap::from([
                ("work".to_string(), "work".to_string()),
                ("wrap".to_string(), "wrap".to_string()),
            ]),
        );
        graph.add_edge("wrap", END);
        graph.compile().unwrap()
    }

    #[tokio::test]
    async fn test_invoke_runs_until_end() {
        let graph = looping_graph(3);
        let state = graph.invoke(LoopState::default()).await.unwrap();
        assert_eq!(state.trace, vec!["work", "work", "work", "wrap"]);
    }

    #[tokio::test]
    async fn test_invoke_respects_step_limit() {
        let graph = looping_graph(100).with_step_limit(5);
        let err = graph.invoke(LoopState::default()).await.unwrap_err();
        assert!(matches!(err, GraphError::Execution(msg) if msg.contains("step limit")));
    }

    #[tokio::test]
    async fn test_stream_updates_emits_every_node_in_order() {
        let graph = looping_graph(2);
        let mut stream = graph.stream_updates(LoopState::default());

        let mut nodes = Vec::new();
        while let Some(item) = stream.next().await {
            nodes.push(item.unwrap().node);
        }
        assert_eq!(nodes, vec!["work", "work", "wrap"]);
    }

    #[tokio::test]
    async fn test_stream_updates_surfaces_node_error() {
        let mut builder: StateGraph<LoopState> = StateGraph::new();
        builder.add_node("bad", |_s: LoopState| async {
            Err(GraphError::Custom("kaboom".into()))
        });
        builder.add_edge(START, "bad");
        builder.add_edge("bad", END);
        let graph = builder.compile().unwrap();

        let mut stream = graph.stream_updates(LoopState::default());
        let first = stream.next().await.unwrap();
        assert!(first.is_err());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_aborts_driver() {
        let executed = Arc::new(AtomicUsize::new(0));
        let counter = executed.clone();

        let mut builder: StateGraph<LoopState> = StateGraph::new();
        builder.add_node("work", move |_s: LoopState| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(LoopUpdate {
                    label: "work".into(),
                })
            }
        });
        builder.add_edge(START, "work");
        builder.add_conditional_edges(
            "work",
            |_s: &LoopState| "work".to_string(),
            HashMap::from([("work".to_string(), "work".to_string())]),
        );
        let graph = builder.compile().unwrap();

        let mut stream = graph.stream_updates(LoopState::default());
        let _first = stream.next().await.unwrap().unwrap();
        drop(stream);

        // The driver may finish at most the node that was in flight when the
        // stream was dropped, then stop. Give it a moment and check it is no
        // longer making progress.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let after_drop = executed.load(Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(executed.load(Ordering::SeqCst), after_drop);
    }
}
