//! Minimal message types for turn state.
//!
//! Message roles: System (usually first in the list), User, Assistant.
//! Used by `TurnState::conversation` and the nodes that read/append messages.

/// A single message in the conversation.
///
/// Roles: system prompt, user input, assistant reply. No separate Tool role.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum Message {
    /// System prompt; typically placed first in the message list.
    System(String),
    /// User input.
    User(String),
    /// Model/agent reply.
    Assistant(String),
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::System(content.into())
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(content.into())
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant(content.into())
    }
}
