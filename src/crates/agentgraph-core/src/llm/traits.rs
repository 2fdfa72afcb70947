//! Core trait for chat-based language models.
//!
//! The engine is an orchestration framework, not an LLM client library: it
//! defines the [`ChatModel`] capability and stays provider-agnostic. Users
//! implement the trait for their provider (or inject scripted models in
//! tests) and share instances as `Arc<dyn ChatModel>`.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::{GraphError, Result};
use crate::llm::config::ChatRequest;
use crate::llm::response::{ChatResponse, ChatStreamResponse};

/// Provider-agnostic chat model capability.
///
/// Implementations must be `Send + Sync`. Tool binding travels on the
/// request (`ChatRequest::with_tools`); a provider that cannot bind tools
/// fails `chat` with an error whose text contains `"does not support tools"`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete response for the request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Stream a response chunk by chunk.
    async fn stream(&self, request: ChatRequest) -> Result<ChatStreamResponse>;

    /// Elicit a JSON value matching the given schema.
    ///
    /// The default implementation appends a system instruction describing the
    /// schema, performs a normal `chat` call and parses the reply (stripping
    /// Markdown fences). Providers with native structured-output support
    /// should override this.
    async fn chat_structured(&self, request: ChatRequest, schema: JsonValue) -> Result<JsonValue> {
        let mut request = request;
        request.messages.push(crate::messages::Message::system(format!(
            "Respond with a single JSON object matching this schema, and nothing else:\n{}",
            schema
        )));

        let response = self.chat(request).await?;
        extract_json(&response.message.content)
    }

    /// Whether the model/provider is reachable. Defaults to `true`.
    async fn is_available(&self) -> Result<bool> {
        Ok(true)
    }

    /// Clone this model into a boxed trait object.
    fn clone_box(&self) -> Box<dyn ChatModel>;
}

impl Clone for Box<dyn ChatModel> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Parse a JSON value out of model output.
///
/// Accepts raw JSON, JSON wrapped in Markdown fences, and JSON embedded in
/// surrounding prose (first `{` to last `}`).
pub fn extract_json(text: &str) -> Result<JsonValue> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    if let Ok(value) = serde_json::from_str(cleaned) {
        return Ok(value);
    }

    let start = cleaned.find('{');
    let end = cleaned.rfind('}');
    if let (Some(start), Some(end)) = (start, end) {
        if start < end {
            if let Ok(value) = serde_json::from_str(&cleaned[start..=end]) {
                return Ok(value);
            }
        }
    }

    let preview: String = cleaned.chars().take(120).collect();
    Err(GraphError::Llm(format!(
        "model output is not valid JSON: {}",
        preview
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Message;
    use serde_json::json;
    use std::sync::Arc;

    #[derive(Clone)]
    struct MockModel {
        response_text: String,
    }

    #[async_trait]
    impl ChatModel for MockModel {
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse::from_text(self.response_text.clone()))
        }

        async fn stream(&self, _request: ChatRequest) -> Result<ChatStreamResponse> {
            Err(GraphError::Llm("streaming not supported".into()))
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn test_trait_object_chat() {
        let model: Arc<dyn ChatModel> = Arc::new(MockModel {
            response_text: "Hello!".into(),
        });
        let response = model
            .chat(ChatRequest::new(vec![Message::human("Hi")]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "Hello!");
    }

    #[tokio::test]
    async fn test_chat_structured_default_parses_fenced_json() {
        let model = MockModel {
            response_text: "```json\n{\"next\": \"FINISH\"}\n```".into(),
        };
        let value = model
            .chat_structured(ChatRequest::new(vec![]), json!({"type": "object"}))
            .await
            .unwrap();
        assert_eq!(value["next"], "FINISH");
    }

    #[test]
    fn test_extract_json_plain() {
        let value = extract_json("{\"a\": 1}").unwrap();
        assert_eq!(value["a"], 1);
    }

    #[test]
    fn test_extract_json_embedded_in_prose() {
        let value = extract_json("Here is the plan: {\"steps\": []} hope it helps").unwrap();
        assert!(value["steps"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_extract_json_rejects_garbage() {
        assert!(extract_json("no json here").is_err());
    }

    #[tokio::test]
    async fn test_default_is_available() {
        let model = MockModel {
            response_text: "x".into(),
        };
        assert!(model.is_available().await.unwrap());
    }
}
