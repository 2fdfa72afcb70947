//! Per-request chat-model selection.
//!
//! Model choice is dynamic: `UserContext.preferences` carries selection
//! hints, and every node asks the factory for a model instead of holding a
//! client. Factories may cache long-lived clients keyed by endpoint; they
//! must stay thread-safe or create per call.

use std::sync::Arc;

use agentgraph_core::llm::ChatModel;

use crate::error::Result;
use crate::state::UserContext;

/// Creates chat models from a user context and a temperature.
pub trait ChatModelFactory: Send + Sync {
    /// Create (or fetch a cached) model for this request.
    fn create(&self, context: &UserContext, temperature: f32) -> Result<Arc<dyn ChatModel>>;
}

/// A factory that always returns the same model, ignoring context.
///
/// Used by tests to inject scripted models and by deployments with a single
/// configured provider.
pub struct FixedModelFactory {
    model: Arc<dyn ChatModel>,
}

impl FixedModelFactory {
    /// Wrap a model.
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

impl ChatModelFactory for FixedModelFactory {
    fn create(&self, _context: &UserContext, _temperature: f32) -> Result<Arc<dyn ChatModel>> {
        Ok(self.model.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentgraph_core::llm::{ChatRequest, ChatResponse, ChatStreamResponse};
    use agentgraph_core::GraphError;
    use async_trait::async_trait;

    #[derive(Clone)]
    struct EchoModel;

    #[async_trait]
    impl ChatModel for EchoModel {
        async fn chat(
            &self,
            request: ChatRequest,
        ) -> agentgraph_core::Result<ChatResponse> {
            let last = request
                .messages
                .last()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            Ok(ChatResponse::from_text(last))
        }

        async fn stream(
            &self,
            _request: ChatRequest,
        ) -> agentgraph_core::Result<ChatStreamResponse> {
            Err(GraphError::Llm("not streaming".into()))
        }

        fn clone_box(&self) -> Box<dyn ChatModel> {
            Box::new(self.clone())
        }
    }

    #[tokio::test]
    async fn test_fixed_factory_ignores_context() {
        let factory = FixedModelFactory::new(Arc::new(EchoModel));
        let model = factory.create(&UserContext::default(), 0.9).unwrap();

        let response = model
            .chat(ChatRequest::new(vec![
                agentgraph_core::messages::Message::human("hi"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.message.content, "hi");
    }
}
