//! Deterministic in-memory `LlmClient` for tests: returns a queue of canned
//! replies, one per call, and records the messages/effort each call received.

use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;

pub struct MockLlm {
    replies: Mutex<Vec<String>>,
    calls: Mutex<Vec<(Vec<Message>, Option<ReasoningEffort>, ToolChoiceMode)>>,
}

impl MockLlm {
    /// Replies are returned in order, earliest-first; the list is reversed
    /// internally so each call pops off the front.
    pub fn new(replies: Vec<String>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            replies: Mutex::new(replies),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlm {
    async fn invoke(
        &self,
        messages: &[Message],
        reasoning_effort: Option<ReasoningEffort>,
        tool_choice: ToolChoiceMode,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        assert_eq!(tool_choice, ToolChoiceMode::None, "every call site must suppress tool calls");
        self.calls
            .lock()
            .unwrap()
            .push((messages.to_vec(), reasoning_effort, tool_choice));
        self.replies
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| AgentError::LlmFailed("mock LLM reply queue exhausted".to_string()))
    }
}
