//! Writer: consolidates the team's findings into the final answer.

use std::sync::Arc;

use agentgraph_core::llm::ChatRequest;
use agentgraph_core::messages::Message;
use async_trait::async_trait;

use crate::error::Result;
use crate::llm_factory::ChatModelFactory;
use crate::prompts::PromptSource;
use crate::registry::{Worker, WorkerType};
use crate::state::{StateUpdate, SupervisorState, ThinkingKind, ThinkingStep};
use crate::worker::{error_response, task_hint, worker_outputs, worker_response};

const WRITER_TEMPERATURE: f32 = 0.7;

/// Writing specialist: collects every prior authored assistant message and
/// produces one consolidated Markdown answer in the user's language.
pub struct WriterWorker {
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
}

impl WriterWorker {
    /// Create the worker.
    pub fn new(factory: Arc<dyn ChatModelFactory>, prompts: Arc<PromptSource>) -> Self {
        Self { factory, prompts }
    }
}

#[async_trait]
impl Worker for WriterWorker {
    fn name(&self) -> &str {
        "Writer"
    }

    fn description(&self) -> &str {
        "Writing specialist. Drafts reports, summarizes information and \
         organizes documents. Integrates output from multiple sources into a \
         structured final answer (Markdown, tables) matching the user's tone \
         preferences."
    }

    fn priority(&self) -> i32 {
        5
    }

    fn worker_type(&self) -> WorkerType {
        WorkerType::LlmPowered
    }

    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate> {
        tracing::info!(worker = self.name(), "executing writing task");

        let outputs = worker_outputs(state);
        let original_query = state.original_query.clone();

        if outputs.is_empty() && original_query.is_empty() {
            return Ok(worker_response(
                self.name(),
                "No information available to write about.",
                state,
                None,
            ));
        }

        let context_info = if outputs.is_empty() {
            "No additional information".to_string()
        } else {
            outputs
                .iter()
                .map(|(name, content)| format!("### Output from {}:\n{}", name, content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let language = &state.user_context.language;
        let language_text = if language.contains("zh") { "中文" } else { "English" };

        let prompts = self.prompts.snapshot();
        let system = prompts.get_or(
            "workers.writer.system",
            "You are a writing specialist. Consolidate the findings into one Markdown answer in {language}.",
            &[("language", language_text)],
        );
        let hint = task_hint(state);
        let query = if original_query.is_empty() {
            "Consolidate the available information".to_string()
        } else {
            original_query
        };
        let human = prompts.get_or(
            "workers.writer.human",
            "{task_hint}Original question: {query}\n\nTeam findings:\n{context}",
            &[
                ("task_hint", hint.as_str()),
                ("query", query.as_str()),
                ("context", context_info.as_str()),
            ],
        );

        let model = match self.factory.create(&state.user_context, WRITER_TEMPERATURE) {
            Ok(model) => model,
            Err(e) => return Ok(error_response(self.name(), e.to_string(), state)),
        };

        let request = ChatRequest::new(vec![Message::system(system), Message::human(human)])
            .with_temperature(WRITER_TEMPERATURE);

        match model.chat(request).await {
            Ok(response) => Ok(worker_response(
                self.name(),
                response.message.content,
                state,
                Some(
                    ThinkingStep::new(
                        ThinkingKind::Reasoning,
                        format!("Consolidated {} source(s) into the final answer", outputs.len()),
                    )
                    .with_worker(self.name()),
                ),
            )),
            Err(e) => {
                tracing::error!(worker = self.name(), error = %e, "writing task failed");
                Ok(error_response(
                    self.name(),
                    format!("writing task failed: {}", e),
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
    use crate::state::{TaskStep, UserContext};
    use agentgraph_core::llm::{ChatModel, ChatResponse, ChatStreamResponse};
    use agentgraph_core::GraphError;
    use parking_lot::Mutex;

    #[derive(Clone)]
    struct CapturingModel {
        seen: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl ChatModel for CapturingModel {
        async fn chat(&self, request: ChatRequest) -> agentgraph_core::Result<ChatResponse> {
            self.seen
                .lock()
                .extend(request.messages.iter().map(|m| m.content.clone()));
            Ok(ChatResponse::from_text("# Final report"))
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

    fn writer(seen: Arc<Mutex<Vec<String>>>) -> WriterWorker {
        WriterWorker::new(
            Arc::new(FixedModelFactory::new(Arc::new(CapturingModel { seen }))),
            Arc::new(PromptSource::with_defaults()),
        )
    }

    #[tokio::test]
    async fn test_collects_named_worker_outputs() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = writer(seen.clone());

        let mut state = SupervisorState::from_query("summarize", UserContext::default());
        state.task_plan = vec![
            TaskStep::new("step_1", "Researcher", "research"),
            TaskStep::new("step_2", "Writer", "write"),
        ];
        state.current_step_index = 1;
        state
            .messages
            .push(Message::assistant("fact A").with_name("Researcher"));
        state
            .messages
            .push(Message::assistant("figure B").with_name("DataTeam"));

        let update = worker.execute(&state).await.unwrap();
        assert_eq!(update.messages[0].content, "# Final report");

        let prompt = seen.lock().join("\n");
        assert!(prompt.contains("Output from Researcher"));
        assert!(prompt.contains("fact A"));
        assert!(prompt.contains("Output from DataTeam"));
        assert!(prompt.contains("figure B"));
    }

    #[tokio::test]
    async fn test_language_preference_selects_language_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let worker = writer(seen.clone());

        let mut context = UserContext::default();
        context.language = "en-US".into();
        let state = SupervisorState::from_query("summarize", context);

        worker.execute(&state).await.unwrap();
        assert!(seen.lock().join("\n").contains("English"));
    }
}
