//! Service layer: runs requests through the performance layer and the
//! graph, streaming a small, stable event vocabulary.
//!
//! # Stream protocol
//!
//! Serialized as JSON, one event per line under text/event-stream framing
//! (`data: <json>\n\n`). Only five event types exist:
//!
//! | type | fields | meaning |
//! |------|--------|---------|
//! | `start` | - | request accepted |
//! | `progress` | `progress {current, total}` | multi-step plans only |
//! | `answer` | `content`, optional `progress` | an assistant turn |
//! | `done` | - | clean termination |
//! | `error` | `content` | terminal failure |
//!
//! Internal routing, planning details and thinking steps are never emitted.

use std::sync::Arc;

use agentgraph_core::messages::MessageRole;
use agentgraph_core::state::GraphState;
use agentgraph_core::Checkpointer;
use futures::Stream;
use serde::Serialize;
use tokio_stream::StreamExt;

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::llm_factory::ChatModelFactory;
use crate::perf::PerformanceLayer;
use crate::prompts::PromptSource;
use crate::registry::WorkerRegistry;
use crate::state::{SupervisorState, UserContext};
use crate::supervisor::SupervisorNode;
use crate::tools::fallback::FallbackManager;
use crate::tools::ToolSource;
use crate::workflow::{build_graph, SUPERVISOR_NODE};
use crate::workers::{
    DataAnalystWorker, DataTeamWorker, Database, GeneralWorker, MockDatabase, ResearcherWorker,
    WriterWorker,
};

/// Event type tags of the stream protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventType {
    Start,
    Progress,
    Answer,
    Done,
    Error,
}

/// Progress payload: steps done out of steps planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Steps completed or skipped.
    pub current: usize,
    /// Total planned steps.
    pub total: usize,
}

/// One event of the stream protocol.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: StreamEventType,

    /// Content payload (`answer` and `error` events).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content: String,

    /// Progress payload (`progress` and optionally `answer` events).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

impl StreamEvent {
    /// The `start` event.
    pub fn start() -> Self {
        Self {
            event_type: StreamEventType::Start,
            content: String::new(),
            progress: None,
        }
    }

    /// An `answer` event.
    pub fn answer(content: impl Into<String>, progress: Option<Progress>) -> Self {
        Self {
            event_type: StreamEventType::Answer,
            content: content.into(),
            progress,
        }
    }

    /// A `progress` event (no content).
    pub fn progress(progress: Progress) -> Self {
        Self {
            event_type: StreamEventType::Progress,
            content: String::new(),
            progress: Some(progress),
        }
    }

    /// The `done` event.
    pub fn done() -> Self {
        Self {
            event_type: StreamEventType::Done,
            content: String::new(),
            progress: None,
        }
    }

    /// A terminal `error` event.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            event_type: StreamEventType::Error,
            content: content.into(),
            progress: None,
        }
    }

    /// Serialize to the SSE wire format: `data: <json>\n\n`.
    pub fn to_sse(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{\"type\":\"error\"}".into());
        format!("data: {}\n\n", json)
    }
}

/// Outcome of a non-streaming run.
#[derive(Debug)]
pub enum RunOutcome {
    /// The performance layer answered; the graph never ran.
    Cached {
        /// The canned or cached answer.
        answer: String,
        /// `rule_engine` or `semantic_cache`.
        source: &'static str,
    },
    /// The graph ran to completion.
    Completed(Box<SupervisorState>),
}

impl RunOutcome {
    /// Whether the answer came from the performance layer.
    pub fn cached(&self) -> bool {
        matches!(self, Self::Cached { .. })
    }
}

/// Immutable dependency container shared by every node. Constructed once at
/// startup; the runtime holds no process-wide singletons.
pub struct Services {
    /// Worker catalog.
    pub registry: Arc<WorkerRegistry>,
    /// Prompt templates.
    pub prompts: Arc<PromptSource>,
    /// Tool schemas and executors.
    pub tools: Arc<ToolSource>,
    /// Fallback content for models without tool support.
    pub fallback: Arc<FallbackManager>,
    /// Per-request chat-model selection.
    pub factory: Arc<dyn ChatModelFactory>,
    /// Pre-compute gates.
    pub performance: Arc<PerformanceLayer>,
    /// Optional per-thread state persistence.
    pub checkpointer: Option<Arc<dyn Checkpointer>>,
}

/// The supervisor service: the one entry point a transport calls.
pub struct SupervisorService {
    services: Services,
    supervisor: Arc<SupervisorNode>,
}

impl SupervisorService {
    /// Create the service.
    pub fn new(services: Services, config: SupervisorConfig) -> Self {
        let supervisor = Arc::new(SupervisorNode::new(
            config,
            services.factory.clone(),
            services.prompts.clone(),
        ));
        Self {
            services,
            supervisor,
        }
    }

    /// Register the built-in worker team (Researcher, DataAnalyst, Writer,
    /// General, DataTeam) against the given database capability.
    pub fn register_default_workers(&self, database: Arc<dyn Database>) {
        let factory = self.services.factory.clone();
        let prompts = self.services.prompts.clone();
        let registry = &self.services.registry;

        registry.register(Arc::new(ResearcherWorker::new(
            factory.clone(),
            prompts.clone(),
        )));
        registry.register(Arc::new(DataAnalystWorker::new(
            factory.clone(),
            prompts.clone(),
        )));
        registry.register(Arc::new(WriterWorker::new(
            factory.clone(),
            prompts.clone(),
        )));
        registry.register(Arc::new(GeneralWorker::new(
            factory.clone(),
            prompts.clone(),
            self.services.tools.clone(),
            self.services.fallback.clone(),
        )));

        match DataTeamWorker::new(factory, prompts, database) {
            Ok(worker) => registry.register(Arc::new(worker)),
            Err(e) => tracing::error!(error = %e, "DataTeam subgraph failed to build"),
        }
    }

    /// Register the built-in workers against the canned mock database.
    pub fn register_default_workers_with_mock_db(&self) {
        self.register_default_workers(Arc::new(MockDatabase));
    }

    /// Access the dependency container.
    pub fn services(&self) -> &Services {
        &self.services
    }

    fn seed_state(&self, message: &str, user_context: Option<UserContext>) -> SupervisorState {
        SupervisorState::from_query(message, user_context.unwrap_or_default())
    }

    /// The terminal assistant answer of a finished state, if one exists.
    fn final_answer(state: &SupervisorState) -> Option<String> {
        state
            .messages
            .last()
            .filter(|m| m.role == MessageRole::Assistant)
            .map(|m| m.content.clone())
    }

    /// Fire-and-forget cache insert; never affects the response.
    fn spawn_cache_insert(&self, query: String, answer: String) {
        let performance = self.services.performance.clone();
        tokio::spawn(async move {
            performance.cache_answer(&query, &answer, None).await;
        });
    }

    async fn save_checkpoint(&self, thread_id: &str, state: &SupervisorState) {
        let Some(checkpointer) = &self.services.checkpointer else {
            return;
        };
        match serde_json::to_value(state) {
            Ok(snapshot) => {
                if let Err(e) = checkpointer.save(thread_id, snapshot).await {
                    tracing::warn!(thread_id, error = %e, "checkpoint save failed");
                }
            }
            Err(e) => tracing::warn!(thread_id, error = %e, "state not serializable"),
        }
    }

    /// Run a request to completion.
    pub async fn run(
        &self,
        message: &str,
        thread_id: &str,
        user_context: Option<UserContext>,
    ) -> Result<RunOutcome> {
        if message.trim().is_empty() {
            return Err(SupervisorError::Validation("empty message".into()));
        }

        if let Some(hit) = self.services.performance.process_query(message).await {
            tracing::info!(source = hit.source.as_str(), "performance layer hit");
            return Ok(RunOutcome::Cached {
                answer: hit.answer,
                source: hit.source.as_str(),
            });
        }

        let snapshot = self.services.registry.snapshot();
        let graph = build_graph(self.supervisor.clone(), snapshot)?;

        tracing::info!(thread_id, "running supervisor");
        let final_state = graph
            .invoke(self.seed_state(message, user_context))
            .await?;

        if let Some(answer) = Self::final_answer(&final_state) {
            self.spawn_cache_insert(message.to_string(), answer);
        }
        self.save_checkpoint(thread_id, &final_state).await;

        tracing::info!(thread_id, "supervisor run complete");
        Ok(RunOutcome::Completed(Box::new(final_state)))
    }

    /// Run a request, streaming the protocol events.
    ///
    /// Guarantees: `start` is emitted exactly once and first; exactly one of
    /// `done`/`error` terminates the stream; every `answer` has non-empty
    /// content; supervisor decisions and thinking steps are never emitted.
    pub fn run_stream<'a>(
        &'a self,
        message: &'a str,
        thread_id: &'a str,
        user_context: Option<UserContext>,
    ) -> impl Stream<Item = StreamEvent> + 'a {
        async_stream::stream! {
            yield StreamEvent::start();

            if message.trim().is_empty() {
                yield StreamEvent::error("empty message");
                return;
            }

            if let Some(hit) = self.services.performance.process_query(message).await {
                tracing::info!(source = hit.source.as_str(), "performance layer hit");
                yield StreamEvent::answer(hit.answer, None);
                yield StreamEvent::done();
                return;
            }

            let snapshot = self.services.registry.snapshot();
            let graph = match build_graph(self.supervisor.clone(), snapshot) {
                Ok(graph) => graph,
                Err(e) => {
                    tracing::error!(error = %e, "graph build failed");
                    yield StreamEvent::error("internal error building the workflow");
                    return;
                }
            };

            let mut state = self.seed_state(message, user_context);
            let mut updates = graph.stream_updates(state.clone());
            let mut final_answer: Option<String> = None;

            tracing::info!(thread_id, "streaming supervisor run");

            while let Some(item) = updates.next().await {
                let update = match item {
                    Ok(update) => update,
                    Err(e) => {
                        tracing::error!(error = %e, "graph execution failed");
                        yield StreamEvent::error("execution failed");
                        return;
                    }
                };

                let node_messages = update.update.messages.clone();
                state.apply(update.update);

                // Progress from the post-merge plan; only meaningful for
                // multi-step plans.
                let total = state.task_plan.len();
                let progress = (total > 1).then(|| Progress {
                    current: state.completed_steps(),
                    total,
                });

                if update.node != SUPERVISOR_NODE {
                    if let Some(message) = node_messages.last() {
                        if !message.content.is_empty() {
                            final_answer = Some(message.content.clone());
                            yield StreamEvent::answer(message.content.clone(), progress);
                        }
                    }
                } else if let Some(progress) = progress {
                    if progress.current > 0 {
                        yield StreamEvent::progress(progress);
                    }
                }
            }

            if let Some(answer) = final_answer {
                self.spawn_cache_insert(message.to_string(), answer);
            }
            self.save_checkpoint(thread_id, &state).await;

            tracing::info!(thread_id, "streaming supervisor run complete");
            yield StreamEvent::done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_shapes() {
        let start = serde_json::to_value(StreamEvent::start()).unwrap();
        assert_eq!(start, serde_json::json!({"type": "start"}));

        let answer = serde_json::to_value(StreamEvent::answer(
            "hello",
            Some(Progress {
                current: 1,
                total: 2,
            }),
        ))
        .unwrap();
        assert_eq!(
            answer,
            serde_json::json!({
                "type": "answer",
                "content": "hello",
                "progress": {"current": 1, "total": 2}
            })
        );

        let progress = serde_json::to_value(StreamEvent::progress(Progress {
            current: 1,
            total: 3,
        }))
        .unwrap();
        assert_eq!(
            progress,
            serde_json::json!({"type": "progress", "progress": {"current": 1, "total": 3}})
        );

        let done = serde_json::to_value(StreamEvent::done()).unwrap();
        assert_eq!(done, serde_json::json!({"type": "done"}));
    }

    #[test]
    fn test_sse_framing() {
        let sse = StreamEvent::done().to_sse();
        assert_eq!(sse, "data: {\"type\":\"done\"}\n\n");
        assert!(sse.ends_with("\n\n"));
    }

    #[test]
    fn test_run_outcome_cached_flag() {
        let cached = RunOutcome::Cached {
            answer: "hi".into(),
            source: "rule_engine",
        };
        assert!(cached.cached());

        let completed = RunOutcome::Completed(Box::default());
        assert!(!completed.cached());
    }
}
