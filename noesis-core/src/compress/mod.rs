//! Conversation compaction for `PrepareConversation` (spec §4.1).
//!
//! Narrowed to the single summarize-on-threshold behavior `PrepareConversation`
//! needs; the teacher's broader auto-compact/prune configuration axis has no
//! counterpart in this spec and was dropped.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;
use crate::token_count::count_conversation_tokens;

/// Design-value default for the token budget above which `PrepareConversation`
/// summarizes history (spec `HISTORY_TOKEN_LIMIT`); the live threshold is read
/// from `AgentConfig::history_token_limit` and passed in by the caller so it
/// stays overridable via the environment.
pub const HISTORY_TOKEN_LIMIT: usize = 10_000;

const SUMMARIZER_SYSTEM_PROMPT: &str = "Summarize the conversation below, omitting the final \
user message (it will be kept verbatim). Be concise but preserve facts, names, and decisions \
relevant to answering follow-up questions.";

/// If `conversation`'s token count exceeds `history_token_limit`, replaces it with
/// `[system(summary), last_user_message]`. On any summarizer failure, returns the
/// conversation unchanged (spec §4.1: "never abort the turn here").
///
/// Requires at least one message; an empty conversation is returned unchanged
/// (there is nothing to summarize and no "last user message" to preserve).
pub async fn summarize_if_needed(
    conversation: Vec<Message>,
    llm: &Arc<dyn LlmClient>,
    history_token_limit: usize,
    cancel: &CancellationToken,
) -> Vec<Message> {
    if conversation.is_empty() {
        return conversation;
    }
    if count_conversation_tokens(&conversation) <= history_token_limit {
        return conversation;
    }

    let Some(last) = conversation.last().cloned() else {
        return conversation;
    };
    let history_without_last = &conversation[..conversation.len() - 1];
    if history_without_last.is_empty() {
        return conversation;
    }

    let mut prompt_messages = vec![Message::system(SUMMARIZER_SYSTEM_PROMPT)];
    prompt_messages.extend(history_without_last.iter().cloned());

    match llm
        .invoke(&prompt_messages, Some(ReasoningEffort::Low), ToolChoiceMode::None, cancel)
        .await
    {
        Ok(summary) => vec![Message::system(format!("summary: {summary}")), last],
        Err(_) => conversation,
    }
}
