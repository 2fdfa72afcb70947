//! General: conversational catch-all with tool calling and a degraded path
//! for models without tool support.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use agentgraph_core::llm::{ChatModel, ChatRequest};
use agentgraph_core::messages::{Message, MessageRole};
use async_trait::async_trait;

use crate::error::Result;
use crate::llm_factory::ChatModelFactory;
use crate::prompts::{PromptSnapshot, PromptSource};
use crate::registry::{Worker, WorkerType};
use crate::state::{StateUpdate, SupervisorState};
use crate::tools::fallback::FallbackManager;
use crate::tools::ToolSource;
use crate::worker::{error_response, query_for, worker_response};

const GENERAL_TEMPERATURE: f32 = 0.5;

/// Number of trailing history messages passed to the model.
const HISTORY_WINDOW: usize = 6;

/// Error-text marker a provider uses to reject tool binding.
const TOOLS_UNSUPPORTED_MARKER: &str = "does not support tools";

/// General assistant. Handles chit-chat, identity questions and - via the
/// `get_current_datetime` tool - anything about the current date or time.
///
/// The tools-supported latch is per-instance and one-way: the first
/// "does not support tools" rejection flips it to false for the lifetime of
/// the worker, and later invocations go straight to the fallback path.
/// Resetting it means replacing the worker in the registry.
pub struct GeneralWorker {
    factory: Arc<dyn ChatModelFactory>,
    prompts: Arc<PromptSource>,
    tool_source: Arc<ToolSource>,
    fallback: Arc<FallbackManager>,
    tools_supported: AtomicBool,
}

impl GeneralWorker {
    /// Create the worker with tool calling enabled.
    pub fn new(
        factory: Arc<dyn ChatModelFactory>,
        prompts: Arc<PromptSource>,
        tool_source: Arc<ToolSource>,
        fallback: Arc<FallbackManager>,
    ) -> Self {
        Self {
            factory,
            prompts,
            tool_source,
            fallback,
            tools_supported: AtomicBool::new(true),
        }
    }

    /// Whether the tool path is still enabled.
    pub fn tools_supported(&self) -> bool {
        self.tools_supported.load(Ordering::SeqCst)
    }

    /// Last [`HISTORY_WINDOW`] human/assistant messages, excluding the
    /// final message (which carries the query itself).
    fn history(state: &SupervisorState) -> Vec<Message> {
        let upto = state.messages.len().saturating_sub(1);
        let filtered: Vec<&Message> = state.messages[..upto]
            .iter()
            .filter(|m| matches!(m.role, MessageRole::Human | MessageRole::Assistant))
            .collect();
        filtered
            .into_iter()
            .rev()
            .take(HISTORY_WINDOW)
            .rev()
            .cloned()
            .collect()
    }

    async fn execute_with_tools(
        &self,
        model: &Arc<dyn ChatModel>,
        system: &str,
        history: &[Message],
        query: &str,
    ) -> agentgraph_core::Result<String> {
        let tools = self.tool_source.schemas_for(&["get_current_datetime"]);
        if tools.is_empty() {
            return Err(agentgraph_core::GraphError::Llm(
                "no tools available".into(),
            ));
        }

        let mut messages = vec![Message::system(system)];
        messages.extend_from_slice(history);
        messages.push(Message::human(query));

        let request = ChatRequest::new(messages.clone())
            .with_temperature(GENERAL_TEMPERATURE)
            .with_tools(tools);
        let response = model.chat(request).await?;

        let Some(tool_calls) = response.message.tool_calls.clone().filter(|c| !c.is_empty())
        else {
            return Ok(response.message.content);
        };

        tracing::info!(
            worker = "General",
            calls = tool_calls.len(),
            "model requested tool calls"
        );

        // Execute each call, then replay the conversation with the tool
        // results appended so the model can produce the final answer.
        let mut replay = messages;
        replay.push(response.message.clone());
        for call in &tool_calls {
            let output = match self.tool_source.get_executor(&call.name) {
                Some(executor) => match executor.ainvoke(&call.arguments).await {
                    Ok(result) => result,
                    Err(e) => format!("Tool '{}' failed: {}", call.name, e),
                },
                None => format!("Unknown tool: {}", call.name),
            };
            replay.push(Message::tool(output, call.id.clone()));
        }

        let final_response = model
            .chat(ChatRequest::new(replay).with_temperature(GENERAL_TEMPERATURE))
            .await?;
        Ok(final_response.message.content)
    }

    async fn execute_without_tools(
        &self,
        model: &Arc<dyn ChatModel>,
        prompts: &PromptSnapshot,
        history: &[Message],
        query: &str,
        language: &str,
        timezone: &str,
    ) -> agentgraph_core::Result<String> {
        tracing::info!(worker = "General", "using fallback path (literal datetime)");

        let collected = self.fallback.collect(&["datetime"], timezone);
        let datetime_info = collected
            .get("datetime")
            .cloned()
            .unwrap_or_else(|| "unavailable".to_string());

        let system = prompts.get_or(
            "workers.general.system_with_datetime",
            "You are a helpful general assistant. Answer in {language}. Current time information: {datetime_info}",
            &[("language", language), ("datetime_info", datetime_info.as_str())],
        );

        let mut messages = vec![Message::system(system)];
        messages.extend_from_slice(history);
        messages.push(Message::human(query));

        let response = model
            .chat(ChatRequest::new(messages).with_temperature(GENERAL_TEMPERATURE))
            .await?;
        Ok(response.message.content)
    }
}

#[async_trait]
impl Worker for GeneralWorker {
    fn name(&self) -> &str {
        "General"
    }

    fn description(&self) -> &str {
        "General assistant for everyday conversation and tasks. IMPORTANT: \
         answers questions about the current date, time and weekday. Also \
         suited to simple Q&A, small talk and introductions."
    }

    fn priority(&self) -> i32 {
        1
    }

    fn worker_type(&self) -> WorkerType {
        WorkerType::LlmPowered
    }

    fn tools(&self) -> Vec<String> {
        vec!["get_current_datetime".to_string()]
    }

    async fn execute(&self, state: &SupervisorState) -> Result<StateUpdate> {
        tracing::info!(worker = self.name(), "executing general task");

        let prompts = self.prompts.snapshot();

        let Some(query) = query_for(state) else {
            let greeting = prompts.get_or(
                "workers.general.default_greeting",
                "Hello! How can I help you today?",
                &[],
            );
            return Ok(worker_response(self.name(), greeting, state, None));
        };

        let language = &state.user_context.language;
        let timezone = &state.user_context.timezone;
        let language_text = if language.contains("zh") { "中文" } else { "English" };
        let history = Self::history(state);

        let model = match self.factory.create(&state.user_context, GENERAL_TEMPERATURE) {
            Ok(model) => model,
            Err(e) => return Ok(error_response(self.name(), e.to_string(), state)),
        };

        let content = if self.tools_supported() {
            let system = prompts.get_or(
                "workers.general.system",
                "You are a helpful general assistant. Answer in {language}.",
                &[("language", language_text)],
            );

            match self
                .execute_with_tools(&model, &system, &history, &query)
                .await
            {
                Ok(content) => Ok(content),
                Err(e) if e.to_string().to_lowercase().contains(TOOLS_UNSUPPORTED_MARKER) => {
                    tracing::warn!(
                        worker = self.name(),
                        "model rejected tool binding, switching to fallback permanently"
                    );
                    self.tools_supported.store(false, Ordering::SeqCst);
                    self.execute_without_tools(
                        &model,
                        &prompts,
                        &history,
                        &query,
                        language_text,
                        timezone,
                    )
                    .await
                }
                Err(e) => Err(e),
            }
        } else {
            self.execute_without_tools(&model, &prompts, &history, &query, language_text, timezone)
                .await
        };

        match content {
            Ok(content) => Ok(worker_response(self.name(), content, state, None)),
            Err(e) => {
                tracing::error!(worker = self.name(), error = %e, "general task failed");
                Ok(error_response(
                    self.name(),
                    format!("problem handling the request: {}", e),
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
    use crate::state::UserContext;
    use agentgraph_core::llm::{ChatResponse, ChatStreamResponse, ToolCall};
    use agentgraph_core::GraphError;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Scripted model: first call may return tool calls or reject tools,
    /// later calls echo whether the prompt carried datetime info.
    #[derive(Clone)]
    struct ToolScript {
        rejects_tools: bool,
        calls: Arc<Mutex<Vec<ChatRequest>>>,
    }

    #[async_trait]
    impl ChatModel for ToolScript {
        async fn chat(&self, request: ChatRequest) -> agentgraph_core::Result<ChatResponse> {
            self.calls.lock().push(request.clone());

            if !request.config.tools.is_empty() {
                if self.rejects_tools {
                    return Err(GraphError::Llm(
                        "this model does not support tools".into(),
                    ));
                }
                let mut response = ChatResponse::from_text("");
                response.message.tool_calls = Some(vec![ToolCall::new(
                    "call_1",
                    "get_current_datetime",
                    json!({"timezone": "Asia/Tokyo"}),
                )]);
                return Ok(response);
            }

            let has_tool_result = request
                .messages
                .iter()
                .any(|m| m.role == MessageRole::Tool);
            let has_datetime_prompt = request
                .messages
                .iter()
                .any(|m| m.content.contains("Current time information"));

            if has_tool_result {
                Ok(ChatResponse::from_text("answer via tool"))
            } else if has_datetime_prompt {
                Ok(ChatResponse::from_text("answer via fallback"))
            } else {
                Ok(ChatResponse::from_text("plain answer"))
            }
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

    fn general(rejects_tools: bool, calls: Arc<Mutex<Vec<ChatRequest>>>) -> GeneralWorker {
        let model = Arc::new(ToolScript {
            rejects_tools,
            calls,
        });
        GeneralWorker::new(
            Arc::new(FixedModelFactory::new(model)),
            Arc::new(PromptSource::with_defaults()),
            Arc::new(ToolSource::with_builtins()),
            Arc::new(FallbackManager::with_defaults()),
        )
    }

    fn tokyo_state(query: &str) -> SupervisorState {
        let mut context = UserContext::default();
        context.timezone = "Asia/Tokyo".into();
        SupervisorState::from_query(query, context)
    }

    #[tokio::test]
    async fn test_tool_path_executes_and_replays() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let worker = general(false, calls.clone());

        let update = worker.execute(&tokyo_state("what time is it?")).await.unwrap();
        assert_eq!(update.messages[0].content, "answer via tool");
        assert!(worker.tools_supported());

        // Second request replays the conversation with a tool message
        // carrying the Tokyo datetime.
        let recorded = calls.lock();
        assert_eq!(recorded.len(), 2);
        let tool_msg = recorded[1]
            .messages
            .iter()
            .find(|m| m.role == MessageRole::Tool)
            .unwrap();
        assert!(tool_msg.content.contains("Asia/Tokyo"));
    }

    #[tokio::test]
    async fn test_tool_rejection_flips_latch_and_falls_back() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let worker = general(true, calls.clone());
        let state = tokyo_state("what time is it?");

        let update = worker.execute(&state).await.unwrap();
        assert_eq!(update.messages[0].content, "answer via fallback");
        assert!(!worker.tools_supported());

        // The fallback prompt embeds a literal datetime for the user's
        // timezone.
        let fallback_request = calls.lock().last().unwrap().clone();
        let system = &fallback_request.messages[0].content;
        assert!(system.contains("Current time information"));
        assert!(system.contains("Asia/Tokyo"));

        // Subsequent invocations skip the tool attempt entirely.
        let before = calls.lock().len();
        worker.execute(&state).await.unwrap();
        let new_calls: Vec<ChatRequest> = calls.lock()[before..].to_vec();
        assert_eq!(new_calls.len(), 1);
        assert!(new_calls[0].config.tools.is_empty());
    }

    #[tokio::test]
    async fn test_history_window_is_last_six() {
        let mut state = tokyo_state("latest");
        for i in 0..10 {
            state.messages.insert(
                state.messages.len() - 1,
                Message::assistant(format!("old {}", i)),
            );
        }

        let history = GeneralWorker::history(&state);
        assert_eq!(history.len(), HISTORY_WINDOW);
        // The final message carries the query itself and is excluded.
        assert!(history.iter().all(|m| m.content != "latest"));
    }

    #[tokio::test]
    async fn test_empty_query_returns_default_greeting() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let worker = general(false, calls);

        let state = SupervisorState::default();
        let update = worker.execute(&state).await.unwrap();
        assert!(update.messages[0].content.contains("How can I help"));
    }
}
