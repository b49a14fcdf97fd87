//! Message and ConversationContext domain types.
//!
//! These are the core value objects that flow through the entire system:
//! the user sends a message, the orchestrators build LLM requests from the
//! context, tool results and assistant replies are appended back to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::tool::ToolCall;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// An agent reply
    Assistant,
    /// Tool execution result
    Tool,
    /// System instructions
    System,
}

/// What a message carries, independent of who sent it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    ToolCall,
    ToolResponse,
    SystemPrompt,
}

/// A single message in a conversation. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// The text content
    pub content: String,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    pub timestamp: DateTime<Utc>,

    pub conversation_id: ConversationId,
}

impl Message {
    fn build(
        conversation_id: &ConversationId,
        role: Role,
        message_type: MessageType,
        content: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            message_type,
            content,
            tool_call_id: None,
            tool_calls: Vec::new(),
            timestamp: Utc::now(),
            conversation_id: conversation_id.clone(),
        }
    }

    /// Create a new user message.
    pub fn user(conversation_id: &ConversationId, content: impl Into<String>) -> Self {
        Self::build(conversation_id, Role::User, MessageType::Text, content.into())
    }

    /// Create a new assistant text message.
    pub fn assistant(conversation_id: &ConversationId, content: impl Into<String>) -> Self {
        Self::build(conversation_id, Role::Assistant, MessageType::Text, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(
        conversation_id: &ConversationId,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let mut message = Self::build(
            conversation_id,
            Role::Assistant,
            MessageType::ToolCall,
            content.into(),
        );
        message.tool_calls = tool_calls;
        message
    }

    /// Create a new system message.
    pub fn system(conversation_id: &ConversationId, content: impl Into<String>) -> Self {
        Self::build(
            conversation_id,
            Role::System,
            MessageType::SystemPrompt,
            content.into(),
        )
    }

    /// Create a tool result message.
    pub fn tool_result(
        conversation_id: &ConversationId,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::build(
            conversation_id,
            Role::Tool,
            MessageType::ToolResponse,
            content.into(),
        );
        message.tool_call_id = Some(tool_call_id.into());
        message
    }
}

/// An ordered, append-only log of messages for one conversation.
///
/// Messages are never reordered or edited in place; `last_updated` moves
/// forward on every append. A Tool message is only accepted when an earlier
/// Assistant message in the same context requested a tool call with the
/// same id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    conversation_id: ConversationId,
    messages: Vec<Message>,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl ConversationContext {
    /// Create a new empty context.
    pub fn new(conversation_id: ConversationId) -> Self {
        let now = Utc::now();
        Self {
            conversation_id,
            messages: Vec::new(),
            created_at: now,
            last_updated: now,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) -> Result<()> {
        if message.role == Role::Tool {
            let call_id = message.tool_call_id.as_deref().unwrap_or_default();
            if call_id.is_empty() {
                return Err(Error::InvalidInput(
                    "tool message must carry a tool_call_id".into(),
                ));
            }
            if !self.has_tool_call(call_id) {
                return Err(Error::InvalidInput(format!(
                    "tool message references unknown tool call '{call_id}'"
                )));
            }
        }

        self.last_updated = Utc::now().max(self.last_updated);
        self.messages.push(message);
        Ok(())
    }

    /// Borrow the messages in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Copy of the messages; later appends do not affect it.
    pub fn to_vec(&self) -> Vec<Message> {
        self.messages.clone()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Empty the log and reset both timestamps.
    pub fn clear(&mut self) {
        let now = Utc::now();
        self.messages.clear();
        self.created_at = now;
        self.last_updated = now;
    }

    /// The most recent user message, if any.
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }

    fn has_tool_call(&self, call_id: &str) -> bool {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .any(|m| m.tool_calls.iter().any(|tc| tc.id == call_id))
    }
}
