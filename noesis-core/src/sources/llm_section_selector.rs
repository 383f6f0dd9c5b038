//! LLM-backed `SectionSelector` (spec §4.5.2): asks the model which of an
//! article's sections are relevant to the user's intent, given a sanitized
//! tail of the conversation as context.
//!
//! A model asked for JSON routinely wraps it in a ```` ```json ```` fence; the
//! parsing here strips that fence the same way `nodes::plan_research` does for
//! the planner's reply.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;
use crate::sources::traits::{Section, SectionSelector};

/// How many trailing conversation messages are included as intent context.
const CONTEXT_MESSAGE_WINDOW: usize = 6;

pub struct LlmSectionSelector {
    llm: Arc<dyn LlmClient>,
}

impl LlmSectionSelector {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl SectionSelector for LlmSectionSelector {
    async fn select(
        &self,
        sections: &[Section],
        conversation: &[Message],
    ) -> Result<Vec<usize>, AgentError> {
        if sections.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = build_prompt(sections, conversation);
        // `select`'s own call doesn't receive the turn's cancellation token (the
        // `SectionSelector` trait predates it); a cancelled turn still returns
        // promptly because `ExecuteQueries` aborts this whole fan-out task on
        // cancellation rather than waiting for it to finish.
        let reply = self
            .llm
            .invoke(
                &[Message::system(SYSTEM_PROMPT), Message::user(prompt)],
                Some(ReasoningEffort::Low),
                ToolChoiceMode::None,
                &CancellationToken::new(),
            )
            .await?;

        let indices = parse_indices(&reply, sections.len());
        Ok(indices)
    }
}

const SYSTEM_PROMPT: &str = "You select which sections of a reference article are relevant \
to a conversation. Reply with only a JSON array of the relevant section numbers, e.g. [0, 2].";

fn build_prompt(sections: &[Section], conversation: &[Message]) -> String {
    let tail_start = conversation.len().saturating_sub(CONTEXT_MESSAGE_WINDOW);
    let context: String = conversation[tail_start..]
        .iter()
        .map(|m| format!("{m:?}"))
        .collect::<Vec<_>>()
        .join("\n");

    let listing: String = sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{i}] {}", s.header))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Conversation context:\n{context}\n\nArticle sections:\n{listing}\n\n\
         Which section numbers are relevant? Reply with only a JSON array of integers."
    )
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonIndices {
    Ints(Vec<usize>),
}

fn parse_indices(reply: &str, section_count: usize) -> Vec<usize> {
    let stripped = strip_fence(reply);
    let Ok(JsonIndices::Ints(indices)) = serde_json::from_str::<JsonIndices>(stripped) else {
        return Vec::new();
    };
    indices.into_iter().filter(|i| *i < section_count).collect()
}

/// Strips a leading/trailing ``` or ```json fence, if present.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn sections() -> Vec<Section> {
        vec![
            Section { header: "1. Intro".into(), text: "a".into() },
            Section { header: "2. Body".into(), text: "b".into() },
            Section { header: "3. Conclusion".into(), text: "c".into() },
        ]
    }

    /// **Scenario**: a plain JSON array reply selects those indices.
    #[tokio::test]
    async fn parses_plain_json_array() {
        let llm = Arc::new(MockLlm::new(vec!["[0, 2]".to_string()]));
        let selector = LlmSectionSelector::new(llm);
        let indices = selector.select(&sections(), &[]).await.unwrap();
        assert_eq!(indices, vec![0, 2]);
    }

    /// **Scenario**: a fenced ```json reply is stripped before parsing.
    #[tokio::test]
    async fn strips_json_fence() {
        let llm = Arc::new(MockLlm::new(vec!["```json\n[1]\n```".to_string()]));
        let selector = LlmSectionSelector::new(llm);
        let indices = selector.select(&sections(), &[]).await.unwrap();
        assert_eq!(indices, vec![1]);
    }

    /// **Scenario**: an out-of-range index is dropped rather than causing a panic downstream.
    #[tokio::test]
    async fn drops_out_of_range_indices() {
        let llm = Arc::new(MockLlm::new(vec!["[0, 99]".to_string()]));
        let selector = LlmSectionSelector::new(llm);
        let indices = selector.select(&sections(), &[]).await.unwrap();
        assert_eq!(indices, vec![0]);
    }

    /// **Scenario**: unparseable text yields an empty selection, not an error (the
    /// caller's retry/fallback handles this).
    #[tokio::test]
    async fn unparseable_reply_yields_empty_selection() {
        let llm = Arc::new(MockLlm::new(vec!["I'm not sure.".to_string()]));
        let selector = LlmSectionSelector::new(llm);
        let indices = selector.select(&sections(), &[]).await.unwrap();
        assert!(indices.is_empty());
    }

    /// **Scenario**: an empty section list short-circuits without calling the LLM.
    #[tokio::test]
    async fn empty_sections_short_circuits() {
        let llm = Arc::new(MockLlm::new(vec![]));
        let selector = LlmSectionSelector::new(llm.clone());
        let indices = selector.select(&[], &[]).await.unwrap();
        assert!(indices.is_empty());
        assert_eq!(llm.call_count(), 0);
    }
}
