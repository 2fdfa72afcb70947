//! Message types for conversational graph workflows.
//!
//! A [`Message`] is one turn in a conversation: a role, opaque text content,
//! an optional author name (which worker produced it) and an optional stable
//! id. Messages are immutable after creation - helpers return new values.
//!
//! # Merging with `add_messages`
//!
//! Message histories are merged with the [`add_messages`] reducer. It appends
//! new messages and honors stable ids: an incoming message whose id matches an
//! existing one replaces it *in place*, preserving conversation order.
//!
//! ```rust
//! use agentgraph_core::messages::{add_messages, Message};
//!
//! let history = vec![
//!     Message::human("Question").with_id("q1"),
//!     Message::assistant("Draft answer").with_id("a1"),
//! ];
//! let update = vec![Message::assistant("Final answer").with_id("a1")];
//!
//! let merged = add_messages(history, update);
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged[1].content, "Final answer");
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::ToolCall;

/// Role of the message sender.
///
/// Serializes to the lowercase strings used by chat-completion APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions or context for the model.
    System,
    /// Input from the end user.
    Human,
    /// Output from the model or a worker.
    Assistant,
    /// Result of a tool execution.
    Tool,
}

/// A single message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Stable identifier. Messages sharing an id replace each other when
    /// merged with [`add_messages`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Role of the sender.
    pub role: MessageRole,

    /// Opaque text content.
    pub content: String,

    /// Author name - for assistant messages, the worker that produced it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Tool calls requested by the model (assistant messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    /// Id of the tool call this message answers (tool messages only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a message with the given role and content.
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            name: None,
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a human message.
    pub fn human(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Human, content)
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Create a tool-result message answering the given tool call.
    pub fn tool(content: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            id: None,
            role: MessageRole::Tool,
            content: content.into(),
            name: None,
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Set the stable id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the author name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach tool calls (assistant messages).
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(tool_calls);
        self
    }

    /// Generate an id if this message does not have one yet.
    pub fn ensure_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(Uuid::new_v4().to_string());
        }
    }
}

/// Merge two message lists, appending and deduplicating by id.
///
/// Rules:
/// - An incoming message with an id equal to an existing message replaces the
///   existing one in place.
/// - Everything else is appended in order.
/// - Messages without ids are always appended.
pub fn add_messages(left: Vec<Message>, right: Vec<Message>) -> Vec<Message> {
    let mut merged = left;

    for incoming in right {
        let replace_at = incoming.id.as_ref().and_then(|id| {
            merged
                .iter()
                .position(|existing| existing.id.as_deref() == Some(id.as_str()))
        });

        match replace_at {
            Some(index) => merged[index] = incoming,
            None => merged.push(incoming),
        }
    }

    merged
}

/// Messages matching the given role, in order.
pub fn filter_by_role(messages: &[Message], role: MessageRole) -> Vec<&Message> {
    messages.iter().filter(|m| m.role == role).collect()
}

/// The most recent human message, if any.
pub fn last_human(messages: &[Message]) -> Option<&Message> {
    messages.iter().rev().find(|m| m.role == MessageRole::Human)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_set_roles() {
        assert_eq!(Message::system("s").role, MessageRole::System);
        assert_eq!(Message::human("h").role, MessageRole::Human);
        assert_eq!(Message::assistant("a").role, MessageRole::Assistant);

        let tool = Message::tool("result", "call_1");
        assert_eq!(tool.role, MessageRole::Tool);
        assert_eq!(tool.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_add_messages_appends() {
        let merged = add_messages(
            vec![Message::human("one")],
            vec![Message::assistant("two"), Message::human("three")],
        );
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[2].content, "three");
    }

    #[test]
    fn test_add_messages_replaces_by_id_in_place() {
        let merged = add_messages(
            vec![
                Message::human("q").with_id("1"),
                Message::assistant("old").with_id("2"),
                Message::human("followup").with_id("3"),
            ],
            vec![Message::assistant("new").with_id("2")],
        );

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[1].content, "new");
        assert_eq!(merged[2].content, "followup");
    }

    #[test]
    fn test_add_messages_without_ids_never_dedupes() {
        let merged = add_messages(
            vec![Message::assistant("same")],
            vec![Message::assistant("same")],
        );
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_ensure_id_is_stable() {
        let mut msg = Message::human("hi");
        assert!(msg.id.is_none());
        msg.ensure_id();
        let first = msg.id.clone();
        msg.ensure_id();
        assert_eq!(msg.id, first);
    }

    #[test]
    fn test_last_human_skips_assistant() {
        let messages = vec![
            Message::human("first"),
            Message::assistant("reply"),
            Message::human("second"),
            Message::assistant("reply 2"),
        ];
        assert_eq!(last_human(&messages).unwrap().content, "second");
    }

    #[test]
    fn test_filter_by_role() {
        let messages = vec![
            Message::system("ctx"),
            Message::human("a"),
            Message::assistant("b"),
            Message::human("c"),
        ];
        let humans = filter_by_role(&messages, MessageRole::Human);
        assert_eq!(humans.len(), 2);
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&MessageRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }
}
