//! LLM capability traits and types.
//!
//! The engine does not ship a concrete LLM client. It defines the
//! [`ChatModel`] trait - invoke, stream, structured output, tool binding via
//! the request - and leaves the provider integration to the application.

pub mod config;
pub mod response;
pub mod tools;
pub mod traits;

pub use config::{ChatConfig, ChatRequest};
pub use response::{ChatResponse, ChatStreamResponse, MessageChunk, UsageMetadata};
pub use tools::{ToolCall, ToolDefinition, ToolResult};
pub use traits::{extract_json, ChatModel};
