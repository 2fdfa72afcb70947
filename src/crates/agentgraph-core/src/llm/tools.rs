//! Tool-calling types for function-calling models.
//!
//! A [`ToolDefinition`] describes a function the model may call (name,
//! description, JSON-Schema parameters). When the model decides to use one it
//! returns [`ToolCall`]s in its response message; the application executes
//! them and feeds [`ToolResult`]s back as tool messages.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Definition of a tool/function an LLM can call.
///
/// `parameters` is a JSON Schema object (`{"type": "object", "properties":
/// ..., "required": ...}`) matching the "function" contract used by
/// chat-tool APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name, e.g. `get_current_datetime`.
    pub name: String,

    /// What the tool does; the model uses this to decide when to call it.
    pub description: String,

    /// JSON Schema for the tool's parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<JsonValue>,
}

impl ToolDefinition {
    /// Create a tool definition with name and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: None,
        }
    }

    /// Attach a JSON Schema for the parameters.
    pub fn with_parameters(mut self, parameters: JsonValue) -> Self {
        self.parameters = Some(parameters);
        self
    }
}

/// A request from the model to invoke a specific tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Identifier associating this call with its result message.
    pub id: String,

    /// Name of the tool to call; matches a [`ToolDefinition::name`].
    pub name: String,

    /// Arguments as a JSON object matching the tool's schema.
    pub arguments: JsonValue,
}

impl ToolCall {
    /// Create a tool call.
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: JsonValue) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// Result of executing a tool call. Exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The [`ToolCall::id`] this result answers.
    pub call_id: String,

    /// Output of a successful execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    /// Error description of a failed execution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result.
    pub fn success(call_id: impl Into<String>, result: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            result: Some(result.into()),
            error: None,
        }
    }

    /// A failed result.
    pub fn error(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            result: None,
            error: Some(error.into()),
        }
    }

    /// Whether the execution succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_builder() {
        let tool = ToolDefinition::new("search", "Search the web")
            .with_parameters(json!({"type": "object"}));
        assert_eq!(tool.name, "search");
        assert!(tool.parameters.is_some());
    }

    #[test]
    fn test_tool_call_arguments() {
        let call = ToolCall::new("c1", "calc", json!({"a": 1}));
        assert_eq!(call.arguments["a"], 1);
    }

    #[test]
    fn test_tool_result_variants() {
        assert!(ToolResult::success("c1", "ok").is_success());
        assert!(!ToolResult::error("c2", "bad").is_success());
    }
}
