//! `ClassifyEffort` node (spec §4.2): assigns one of {NONE, SIMPLE, DEEP}.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;
use crate::state::{EffortTier, TurnState};

pub const NODE_ID: &str = "classify_effort";

/// Retries for the classifier's single-digit protocol before defaulting to SIMPLE
/// (spec `CLASSIFIER_MAX_ATTEMPTS`; overridable via `AgentConfig`, this is the default).
pub const CLASSIFIER_MAX_ATTEMPTS: u32 = 3;

const SYSTEM_PROMPT: &str = "You classify how much research a question needs. Reply with \
exactly one digit: 0 if the question needs no research (casual conversation, something you \
already know), 1 if it needs a bounded amount of research, or 2 if it needs deep, thorough \
research across multiple sources. Reply with only the digit.";

pub struct ClassifyEffort {
    llm: Arc<dyn LlmClient>,
    cfg: Arc<AgentConfig>,
}

impl ClassifyEffort {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: Arc<AgentConfig>) -> Self {
        Self { llm, cfg }
    }
}

#[async_trait]
impl Node<TurnState> for ClassifyEffort {
    fn id(&self) -> &str {
        NODE_ID
    }

    async fn run(&self, mut state: TurnState, cancel: &CancellationToken) -> Result<(TurnState, Next), AgentError> {
        let span = info_span!("classify_effort", research_iterations = state.research_iterations);
        let _enter = span.enter();

        let mut messages = vec![Message::system(SYSTEM_PROMPT)];
        messages.extend(state.conversation.iter().cloned());

        let mut tier = None;
        let mut attempts = 0;
        while attempts < self.cfg.classifier_max_attempts {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            attempts += 1;
            match self
                .llm
                .invoke(&messages, Some(ReasoningEffort::Low), ToolChoiceMode::None, cancel)
                .await
            {
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                Ok(reply) => {
                    if let Some(parsed) = parse_digit(&reply) {
                        tier = Some(parsed);
                        break;
                    }
                }
                Err(_) => {}
            }
        }

        let tier = tier.unwrap_or(EffortTier::Simple);
        tracing::info!(?tier, attempts, "effort classified");
        state.research_effort = tier;
        Ok((state, Next::Continue))
    }
}

/// Scans `reply` for the first character in `{0,1,2}` and maps it to an `EffortTier`.
fn parse_digit(reply: &str) -> Option<EffortTier> {
    reply.chars().find_map(EffortTier::from_digit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;

    fn conversation() -> Vec<Message> {
        vec![Message::user("hi")]
    }

    fn cfg() -> Arc<AgentConfig> {
        Arc::new(AgentConfig::default())
    }

    /// **Scenario**: a clean "0" reply classifies NONE on the first attempt.
    #[tokio::test]
    async fn clean_digit_classifies_on_first_attempt() {
        let llm = Arc::new(MockLlm::new(vec!["0".to_string()]));
        let node = ClassifyEffort::new(llm.clone(), cfg());
        let state = TurnState::with_conversation(conversation());
        let (out, _) = node.run(state, &CancellationToken::new()).await.unwrap();
        assert!(matches!(out.research_effort, EffortTier::None));
        assert_eq!(llm.call_count(), 1);
    }

    /// **Scenario**: a digit embedded in surrounding text is still found.
    #[tokio::test]
    async fn digit_embedded_in_text_is_found() {
        let llm = Arc::new(MockLlm::new(vec!["I'd say 2, this needs deep research.".to_string()]));
        let node = ClassifyEffort::new(llm, cfg());
        let state = TurnState::with_conversation(conversation());
        let (out, _) = node.run(state, &CancellationToken::new()).await.unwrap();
        assert!(matches!(out.research_effort, EffortTier::Deep));
    }

    /// **Scenario**: invalid replies on every attempt default to SIMPLE after
    /// exhausting `CLASSIFIER_MAX_ATTEMPTS`.
    #[tokio::test]
    async fn exhausted_attempts_default_to_simple() {
        let llm = Arc::new(MockLlm::new(vec![
            "not a digit".to_string(),
            "still nothing".to_string(),
            "nope".to_string(),
        ]));
        let node = ClassifyEffort::new(llm.clone(), cfg());
        let state = TurnState::with_conversation(conversation());
        let (out, _) = node.run(state, &CancellationToken::new()).await.unwrap();
        assert!(matches!(out.research_effort, EffortTier::Simple));
        assert_eq!(llm.call_count(), CLASSIFIER_MAX_ATTEMPTS as usize);
    }

    /// **Scenario**: a valid digit on a later attempt (after earlier failures) still classifies correctly.
    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let llm = Arc::new(MockLlm::new(vec!["garbage".to_string(), "1".to_string()]));
        let node = ClassifyEffort::new(llm.clone(), cfg());
        let state = TurnState::with_conversation(conversation());
        let (out, _) = node.run(state, &CancellationToken::new()).await.unwrap();
        assert!(matches!(out.research_effort, EffortTier::Simple));
        assert_eq!(llm.call_count(), 2);
    }

    /// **Scenario**: a token cancelled before the call returns `Cancelled` without
    /// consuming a reply.
    #[tokio::test]
    async fn cancelled_before_call_returns_cancelled() {
        let llm = Arc::new(MockLlm::new(vec!["0".to_string()]));
        let node = ClassifyEffort::new(llm.clone(), cfg());
        let state = TurnState::with_conversation(conversation());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = node.run(state, &cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
        assert_eq!(llm.call_count(), 0);
    }
}
