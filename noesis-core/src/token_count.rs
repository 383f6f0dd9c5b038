//! Deterministic token counting, shared by `PrepareConversation`'s history-size
//! check and `PlanResearch`'s context-token cap.
//!
//! Uses the `cl100k_base` encoding, a fixed, versioned tokenizer, so the estimate
//! is deterministic across processes and platforms (spec §4.1/§4.3).

use once_cell::sync::Lazy;
use tiktoken_rs::CoreBPE;

use crate::message::Message;

static ENCODING: Lazy<CoreBPE> =
    Lazy::new(|| tiktoken_rs::cl100k_base().expect("cl100k_base encoding tables are embedded"));

/// Number of `cl100k_base` tokens in `text`.
pub fn count_tokens(text: &str) -> usize {
    ENCODING.encode_with_special_tokens(text).len()
}

/// Total tokens across all message contents, matching the original's
/// `encoding.encode(str([msg.content for msg in conversation]))` shape closely
/// enough to give the same order of magnitude while staying a pure function of
/// the `Message` content rather than a language-specific `repr`.
pub fn count_conversation_tokens(conversation: &[Message]) -> usize {
    let joined = conversation
        .iter()
        .map(message_content)
        .collect::<Vec<_>>()
        .join("\n");
    count_tokens(&joined)
}

fn message_content(message: &Message) -> &str {
    match message {
        Message::System(s) | Message::User(s) | Message::Assistant(s) => s,
    }
}
