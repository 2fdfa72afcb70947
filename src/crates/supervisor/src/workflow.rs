//! Wires the supervisor and workers into an executable graph.
//!
//! The shape is fixed: `supervisor` is the entry node, every registered
//! worker gets a node plus an edge back to `supervisor`, and a conditional
//! edge from `supervisor` maps the `next` decision to a worker (or `FINISH`
//! to `END`). The cycle supervisor → worker → supervisor is carried by the
//! graph's edges; workers never call the supervisor directly.

use std::collections::HashMap;
use std::sync::Arc;

use agentgraph_core::graph::{StateGraph, END, START};
use agentgraph_core::CompiledGraph;

use crate::registry::RegistrySnapshot;
use crate::state::{SupervisorState, FINISH};
use crate::supervisor::SupervisorNode;
use crate::worker::error_response;

/// Node id of the supervisor.
pub const SUPERVISOR_NODE: &str = "supervisor";

/// Build the graph for one request over a registry snapshot.
///
/// Worker names are resolved against the snapshot per step, so the same
/// compiled graph keeps working if workers are replaced in the live
/// registry mid-request.
pub fn build_graph(
    supervisor: Arc<SupervisorNode>,
    snapshot: RegistrySnapshot,
) -> agentgraph_core::Result<CompiledGraph<SupervisorState>> {
    let mut graph: StateGraph<SupervisorState> = StateGraph::new();

    let worker_names = snapshot.names_by_priority();
    tracing::info!(workers = worker_names.len(), "building supervisor graph");

    let supervisor_snapshot = snapshot.clone();
    graph.add_node(SUPERVISOR_NODE, move |state: SupervisorState| {
        let supervisor = supervisor.clone();
        let snapshot = supervisor_snapshot.clone();
        async move { Ok(supervisor.run(&state, &snapshot).await) }
    });

    for name in &worker_names {
        let Some(worker) = snapshot.get(name) else {
            continue;
        };

        let node_name = name.clone();
        graph.add_node(name.clone(), move |state: SupervisorState| {
            let worker = worker.clone();
            let node_name = node_name.clone();
            async move {
                tracing::debug!(worker = %node_name, "executing worker node");
                match worker.execute(&state).await {
                    Ok(update) => Ok(update),
                    // A worker that leaks an error still becomes a state
                    // update, never a graph failure.
                    Err(e) => {
                        tracing::error!(worker = %node_name, error = %e, "worker returned an error");
                        Ok(error_response(&node_name, e.to_string(), &state))
                    }
                }
            }
        });
        graph.add_edge(name.clone(), SUPERVISOR_NODE);
    }

    let mut path_map: HashMap<String, String> =
        HashMap::from([(FINISH.to_string(), END.to_string())]);
    for name in &worker_names {
        path_map.insert(name.clone(), name.clone());
    }

    let router_snapshot = snapshot;
    graph.add_conditional_edges(
        SUPERVISOR_NODE,
        move |state: &SupervisorState| {
            let next = state.next.as_str();
            if next != FINISH && !router_snapshot.contains(next) {
                tracing::warn!(next = %next, "route target not registered, finishing");
                return FINISH.to_string();
            }
            next.to_string()
        },
        path_map,
    );

    graph.add_edge(START, SUPERVISOR_NODE);
    graph.compile()
}
