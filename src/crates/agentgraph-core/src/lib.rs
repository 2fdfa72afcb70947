//! # agentgraph-core
//!
//! A lightweight engine for graph-structured agent workflows: named nodes
//! connected by direct and conditional edges, executed one node at a time
//! over a typed state with reducer semantics.
//!
//! ## Building blocks
//!
//! - [`state::GraphState`] - typed state with an associated partial-update
//!   type; the state's `apply` is the only mutation path.
//! - [`graph::StateGraph`] - builder: `add_node`, `add_edge` (with
//!   [`graph::START`]/[`graph::END`] sentinels), `add_conditional_edges`,
//!   `compile`.
//! - [`compiled::CompiledGraph`] - `invoke` to completion, or
//!   `stream_updates` to observe every node's partial update as it happens.
//! - [`messages`] - conversation messages and the `add_messages`
//!   append-and-dedupe-by-id reducer.
//! - [`llm`] - provider-agnostic [`llm::ChatModel`] capability: invoke,
//!   stream, structured output, tool binding.
//! - [`checkpoint`] - per-thread state persistence.
//!
//! ## Example
//!
//! ```rust
//! use agentgraph_core::graph::{StateGraph, END, START};
//! use agentgraph_core::state::GraphState;
//!
//! #[derive(Clone, Debug, Default)]
//! struct Tally { total: i64 }
//!
//! #[derive(Clone, Debug)]
//! struct Add(i64);
//!
//! impl GraphState for Tally {
//!     type Update = Add;
//!     fn apply(&mut self, update: Add) { self.total += update.0; }
//! }
//!
//! # async fn run() -> agentgraph_core::error::Result<()> {
//! let mut graph: StateGraph<Tally> = StateGraph::new();
//! graph.add_node("add_two", |_s: Tally| async { Ok(Add(2)) });
//! graph.add_edge(START, "add_two");
//! graph.add_edge("add_two", END);
//!
//! let compiled = graph.compile()?;
//! let state = compiled.invoke(Tally::default()).await?;
//! assert_eq!(state.total, 2);
//! # Ok(())
//! # }
//! ```

pub mod checkpoint;
pub mod compiled;
pub mod error;
pub mod graph;
pub mod llm;
pub mod messages;
pub mod state;

pub use checkpoint::{Checkpointer, InMemoryCheckpointSaver};
pub use compiled::{CompiledGraph, NodeUpdate, UpdateStream};
pub use error::{GraphError, Result};
pub use graph::{StateGraph, END, START};
pub use messages::{add_messages, Message, MessageRole};
pub use state::GraphState;
