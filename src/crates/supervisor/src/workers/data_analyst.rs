//! DataAnalyst: prompt-only analysis of business data questions.

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

const ANALYST_TEMPERATURE: f32 = 0.1;

/// Data-analysis specialist. Declines time/date questions through its
/// description - that text steers the planner, there is no runtime check.
pub struct DataAnalystWorker {
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
}

impl DataAnalystWorker {
    /// Create the worker.
    pub fn new(factory: Arc<dyn ChatModelFactory>, prompts: Arc<PromptSource>) -> Self {
        Self { factory, prompts }
    }
}

#[async_trait]
impl Worker for DataAnalystWorker {
    fn name(&self) -> &str {
        "DataAnalyst"
    }

    fn description(&self) -> &str {
        "Data analysis specialist. Queries business databases, analyzes \
         sales/inventory/user trends and produces data reports. Note: does \
         NOT answer questions about the current date or time - route those \
         to General."
    }

    fn priority(&self) -> i32 {
        10
    }

    fn worker_type(&self) -> WorkerType {
        WorkerType::LlmPowered
    }

    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate> {
        tracing::info!(worker = self.name(), "executing analysis task");

        let Some(query) = query_for(state) else {
            return Ok(worker_response(
                self.name(),
                "No data question received.",
                state,
                None,
            ));
        };

        let prompts = self.prompts.snapshot();
        let system = prompts.get_or(
            "workers.data_analyst.system",
            "You are a data analysis specialist. Answer with clear, quantified findings.",
            &[],
        );
        let hint = task_hint(state);
        let human = prompts.get_or(
            "workers.data_analyst.human",
            "{task_hint}Question: {query}",
            &[("task_hint", hint.as_str()), ("query", query.as_str())],
        );

        let model = match self.factory.create(&state.user_context, ANALYST_TEMPERATURE) {
            Ok(model) => model,
            Err(e) => return Ok(error_response(self.name(), e.to_string(), state)),
        };

        let request = ChatRequest::new(vec![Message::system(system), Message::human(human)])
            .with_temperature(ANALYST_TEMPERATURE);

        match model.chat(request).await {
            Ok(response) => Ok(worker_response(
                self.name(),
                response.message.content,
                state,
                Some(
                    ThinkingStep::new(ThinkingKind::Reasoning, "Completed data analysis")
                        .with_worker(self.name()),
                ),
            )),
            Err(e) => {
                tracing::error!(worker = self.name(), error = %e, "analysis task failed");
                Ok(error_response(
                    self.name(),
                    format!("analysis task failed: {}", e),
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
    use crate::state::{TaskStatus, UserContext};
    use agentgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use agentgraph_core::GraphError;

    #[derive(Clone)]
    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn chat(&self, _request: ChatRequest) -> agentgraph_core::Result<ChatResponse> {
            Err(GraphError::Llm("model offline".into()))
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

    #[tokio::test]
    async fn test_model_failure_becomes_failed_step() {
        let worker = DataAnalystWorker::new(
            Arc::new(FixedModelFactory::new(Arc::new(FailingModel))),
            Arc::new(PromptSource::with_defaults()),
        );

        let mut state = SupervisorState::from_query("analyze sales", UserContext::default());
        state.task_plan = vec![crate::state::TaskStep::new(
            "step_1",
            "DataAnalyst",
            "look at sales",
        )];

        let update = worker.execute(&state).await.unwrap();

        assert!(update.messages[0].content.starts_with("Execution failed:"));
        assert_eq!(update.metadata["error_type"], "dataanalyst_execution_error");
        assert_eq!(update.task_plan.unwrap()[0].status, TaskStatus::Failed);
    }

    #[test]
    fn test_description_declines_datetime() {
        let worker = DataAnalystWorker::new(
            Arc::new(FixedModelFactory::new(Arc::new(FailingModel))),
            Arc::new(PromptSource::with_defaults()),
        );
        assert!(worker.description().contains("date or time"));
    }
}
