//! Response types for chat models.

use std::collections::HashMap;
use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::messages::Message;

/// A complete response from a chat model.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant message, possibly carrying tool calls.
    pub message: Message,

    /// Token accounting, when the provider reports it.
    pub usage: Option<UsageMetadata>,

    /// Provider-specific metadata.
    pub metadata: HashMap<String, JsonValue>,
}

impl ChatResponse {
    /// A plain-text response without usage or metadata.
    pub fn from_text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            usage: None,
            metadata: HashMap::new(),
        }
    }
}

/// Token usage reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageMetadata {
    /// Tokens in the prompt.
    pub input_tokens: usize,
    /// Tokens generated.
    pub output_tokens: usize,
    /// Total tokens billed.
    pub total_tokens: usize,
}

/// One chunk of a streamed response.
///
/// Token-level streaming from a model is opaque to the graph engine: chunks
/// carry raw text and a terminal marker, nothing else.
#[derive(Debug, Clone)]
pub struct MessageChunk {
    /// Text delta.
    pub content: String,
    /// Set on the final chunk.
    pub done: bool,
}

/// A streaming response: chunks plus final usage once the stream completes.
pub struct ChatStreamResponse {
    /// Stream of message chunks.
    pub stream: Pin<Box<dyn Stream<Item = MessageChunk> + Send>>,
}

impl ChatStreamResponse {
    /// Wrap a chunk stream.
    pub fn new(stream: Pin<Box<dyn Stream<Item = MessageChunk> + Send>>) -> Self {
        Self { stream }
    }
}
