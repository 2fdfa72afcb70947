//! # supervisor
//!
//! A multi-agent orchestration runtime built on `agentgraph-core`. One user
//! query becomes a planned sequence of specialist steps, executed with
//! cooperative scheduling, streamed to the caller, and cached by semantic
//! similarity.
//!
//! ## Shape of a request
//!
//! ```text
//! query ─► performance layer ── hit ──► answer event ─► done
//!               │ miss
//!               ▼
//!        seed SupervisorState
//!               │
//!               ▼
//!        ┌─► supervisor ──► route? ──► worker ─┐
//!        │                   │                 │
//!        │                   ▼                 │
//!        │                 FINISH              │
//!        │                   │                 │
//!        └───────────────────┼─────────────────┘
//!                            ▼
//!              final answer ─► cache insert ─► done
//! ```
//!
//! ## Layers
//!
//! - [`state`] - the typed conversation state and its table-driven reducer.
//! - [`registry`] / [`worker`] / [`workers`] - the worker catalog, the
//!   execution contract, and the built-in team.
//! - [`supervisor`] - the plan → route state machine with deterministic
//!   fast paths.
//! - [`workflow`] - wires supervisor and workers into a graph.
//! - [`perf`] - the rule-engine + semantic-cache gate ahead of the graph.
//! - [`prompts`] / [`tools`] - read-mostly template and tool sources.
//! - [`service`] - `run` / `run_stream` and the stream-event protocol.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use supervisor::config::SupervisorConfig;
//! use supervisor::llm_factory::ChatModelFactory;
//! use supervisor::perf::PerformanceLayer;
//! use supervisor::prompts::PromptSource;
//! use supervisor::registry::WorkerRegistry;
//! use supervisor::service::{Services, SupervisorService};
//! use supervisor::tools::fallback::FallbackManager;
//! use supervisor::tools::ToolSource;
//!
//! # fn factory() -> Arc<dyn ChatModelFactory> { unimplemented!() }
//! # async fn run() -> supervisor::error::Result<()> {
//! let services = Services {
//!     registry: Arc::new(WorkerRegistry::new()),
//!     prompts: Arc::new(PromptSource::with_defaults()),
//!     tools: Arc::new(ToolSource::with_builtins()),
//!     fallback: Arc::new(FallbackManager::with_defaults()),
//!     factory: factory(),
//!     performance: Arc::new(PerformanceLayer::disabled()),
//!     checkpointer: None,
//! };
//!
//! let service = SupervisorService::new(services, SupervisorConfig::from_env());
//! service.register_default_workers_with_mock_db();
//!
//! let outcome = service.run("你好", "thread-1", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod llm_factory;
pub mod perf;
pub mod prompts;
pub mod registry;
pub mod service;
pub mod state;
pub mod supervisor;
pub mod tools;
pub mod worker;
pub mod workers;
pub mod workflow;

pub use config::{PerfConfig, SupervisorConfig};
pub use error::{Result, SupervisorError};
pub use registry::{Worker, WorkerRegistry, WorkerType};
pub use service::{RunOutcome, Services, StreamEvent, StreamEventType, SupervisorService};
pub use state::{
    StateUpdate, SupervisorState, TaskStatus, TaskStep, ThinkingKind, ThinkingStep, UserContext,
    FINISH, MAX_ITERATIONS, MAX_TASK_STEPS,
};
