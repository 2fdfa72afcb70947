//! Request configuration for chat models.

use serde::{Deserialize, Serialize};

use crate::llm::tools::ToolDefinition;
use crate::messages::Message;

/// A request to a chat model: messages plus generation configuration.
///
/// Built with the fluent methods:
///
/// ```rust
/// use agentgraph_core::llm::ChatRequest;
/// use agentgraph_core::messages::Message;
///
/// let request = ChatRequest::new(vec![
///     Message::system("You are a helpful assistant"),
///     Message::human("What is the capital of France?"),
/// ])
/// .with_temperature(0.3)
/// .with_max_tokens(1024);
/// ```
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Conversation messages sent to the model.
    pub messages: Vec<Message>,

    /// Generation parameters.
    pub config: ChatConfig,
}

impl ChatRequest {
    /// Create a request with default configuration.
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            config: ChatConfig::default(),
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = Some(temperature);
        self
    }

    /// Limit the number of generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.config.max_tokens = Some(max_tokens);
        self
    }

    /// Stop generation when any of these sequences appears.
    pub fn with_stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.config.stop_sequences = sequences;
        self
    }

    /// Bind tools the model may call. A provider that cannot bind tools must
    /// fail `chat` with an error whose text contains "does not support
    /// tools" so callers can fall back.
    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.config.tools = tools;
        self
    }
}

/// Generation parameters. Providers honor what they support and ignore the
/// rest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Sampling temperature.
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    pub max_tokens: Option<usize>,

    /// Sequences that stop generation.
    #[serde(default)]
    pub stop_sequences: Vec<String>,

    /// Tool definitions bound to the request.
    #[serde(default)]
    pub tools: Vec<ToolDefinition>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_chain() {
        let request = ChatRequest::new(vec![Message::human("hi")])
            .with_temperature(0.7)
            .with_max_tokens(256)
            .with_stop_sequences(vec!["END".into()]);

        assert_eq!(request.config.temperature, Some(0.7));
        assert_eq!(request.config.max_tokens, Some(256));
        assert_eq!(request.config.stop_sequences, vec!["END".to_string()]);
    }

    #[test]
    fn test_default_config_has_no_tools() {
        let request = ChatRequest::new(vec![]);
        assert!(request.config.tools.is_empty());
        assert!(request.config.temperature.is_none());
    }
}
