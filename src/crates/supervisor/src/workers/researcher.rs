//! Researcher: web search plus synthesis.

use std::sync::Arc;

use agentgraph_core::llm::ChatRequest;
use agentgraph_core::messages::Message;
use async_trait::async_trait;

use crate::error::Result;
use crate::llm_factory::ChatModelFactory;
use crate::prompts::PromptSource;
use crate::registry::{Worker, WorkerType};
use crate::state::{StateUpdate, SupervisorState, ThinkingKind, ThinkingStep};
use crate::worker::{error_response, query_for, task_hint, worker_response};

/// Web-search capability. The concrete backend (Tavily, SearxNG, ...) is an
/// external collaborator; the worker only needs this interface.
#[async_trait]
pub trait SearchTool: Send + Sync {
    /// Run a search and return a textual result block.
    async fn search(&self, query: &str) -> Result<String>;
}

const RESEARCHER_TEMPERATURE: f32 = 0.3;

/// Search specialist: runs a web search and synthesizes the results.
pub struct ResearcherWorker {
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
    search: Option<Arc<dyn SearchTool>>,
}

impl ResearcherWorker {
    /// A researcher without a search backend; searches degrade to a
    /// placeholder note so the model still produces a best-effort answer.
    pub fn new(factory: Arc<dyn ChatModelFactory>, prompts: Arc<PromptSource>) -> Self {
        Self {
            factory,
            prompts,
            search: None,
        }
    }

    /// Attach a search backend.
    pub fn with_search(mut self, search: Arc<dyn SearchTool>) -> Self {
        self.search = Some(search);
        self
    }

    async fn web_search(&self, query: &str) -> String {
        if let Some(search) = &self.search {
            match search.search(query).await {
                Ok(results) => return results,
                Err(e) => {
                    tracing::warn!(error = %e, "search backend failed, using placeholder");
                }
            }
        } else {
            tracing::warn!("no search backend configured, using placeholder");
        }

        format!(
            "Search results for '{}': [no search backend configured; answer \
             from general knowledge and clearly note any uncertainty]",
            query
        )
    }
}

#[async_trait]
impl Worker for ResearcherWorker {
    fn name(&self) -> &str {
        "Researcher"
    }

    fn description(&self) -> &str {
        "Search specialist. Finds and gathers information on the internet, \
         runs multi-round searches and integrates sources. Handles questions \
         about facts, figures and news."
    }

    fn priority(&self) -> i32 {
        10
    }

    fn worker_type(&self) -> WorkerType {
        WorkerType::LlmPowered
    }

    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate> {
        tracing::info!(worker = self.name(), "executing research task");

        let Some(query) = query_for(state) else {
            return Ok(worker_response(
                self.name(),
                "No research question received.",
                state,
                None,
            ));
        };

        let search_results = self.web_search(&query).await;

        let prompts = self.prompts.snapshot();
        let system = prompts.get_or(
            "workers.researcher.system",
            "You are a research specialist. Synthesize the search results into an accurate answer.",
            &[],
        );
        let hint = task_hint(state);
        let human = prompts.get_or(
            "workers.researcher.human",
            "{task_hint}Question: {query}\n\nSearch results:\n{search_results}",
            &[
                ("task_hint", hint.as_str()),
                ("query", query.as_str()),
                ("search_results", search_results.as_str()),
            ],
        );

        let model = match self
            .factory
            .create(&state.user_context, RESEARCHER_TEMPERATURE)
        {
            Ok(model) => model,
            Err(e) => return Ok(error_response(self.name(), e.to_string(), state)),
        };

        let request = ChatRequest::new(vec![Message::system(system), Message::human(human)])
            .with_temperature(RESEARCHER_TEMPERATURE);

        match model.chat(request).await {
            Ok(response) => Ok(worker_response(
                self.name(),
                response.message.content,
                state,
                Some(
                    ThinkingStep::new(ThinkingKind::Reasoning, "Completed search and synthesis")
                        .with_worker(self.name()),
                ),
            )),
            Err(e) => {
                tracing::error!(worker = self.name(), error = %e, "research task failed");
                Ok(error_response(
                    self.name(),
                    format!("research task failed: {}", e),
                    state,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_factory::FixedModelFactory;
    use crate::state::{TaskStatus, TaskStep, UserContext};
    use agentgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use agentgraph_core::GraphError;
    use parking_lot::Mutex;

    #[derive(Clone)]
    struct ScriptedModel {
        reply: String,
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        async fn chat(&self, request: ChatRequest) -> agentgraph_core::Result<ChatResponse> {
            self.seen
                .lock()
                .extend(request.messages.iter().map(|m| m.content.clone()));
            Ok(ChatResponse::from_text(self.reply.clone()))
        }

        async fn stream(
            &self,
            _request: ChatRequest,
        ) -> agentgraph_core::Result<ChatStreamResponse> {
            Err(GraphError::Llm("no streaming".into()))
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    struct FixedSearch;

    #[async_trait]
    impl SearchTool for FixedSearch {
        async fn search(&self, _query: &str) -> Result<String> {
            Ok("result: the sky is blue".into())
        }
    }

    fn worker_with(
        reply: &str,
        seen: Arc<Mutex<Vec<String>>>,
    ) -> ResearcherWorker {
        let model = Arc::new(ScriptedModel {
            reply: reply.into(),
            seen,
        });
        ResearcherWorker::new(
            Arc::new(FixedModelFactory::new(model)),
            Arc::new(PromptSource::with_defaults()),
        )
    }

    fn state() -> SupervisorState {
        let mut state = SupervisorState::from_query("why is the sky blue?", UserContext::default());
        state.task_plan = vec![TaskStep::new("step_1", "Researcher", "research the sky")];
        state
    }

    #[tokio::test]
    async fn test_search_results_reach_the_model() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = worker_with("synthesized", seen.clone()).with_search(Arc::new(FixedSearch));

        let update = worker.execute(&state()).await.unwrap();

        assert_eq!(update.messages[0].content, "synthesized");
        assert_eq!(update.messages[0].name.as_deref(), Some("Researcher"));
        let prompts = seen.lock().join("\n");
        assert!(prompts.contains("the sky is blue"));
        assert!(prompts.contains("research the sky"));
    }

    #[tokio::test]
    async fn test_placeholder_when_no_search_backend() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = worker_with("best effort", seen.clone());

        let update = worker.execute(&state()).await.unwrap();

        assert_eq!(update.messages[0].content, "best effort");
        assert!(seen.lock().join("\n").contains("no search backend configured"));
    }

    #[tokio::test]
    async fn test_marks_step_completed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = worker_with("done", seen);

        let update = worker.execute(&state()).await.unwrap();
        let plan = update.task_plan.unwrap();
        assert_eq!(plan[0].status, TaskStatus::Completed);
        assert_eq!(update.current_step_index, Some(1));
    }
}
