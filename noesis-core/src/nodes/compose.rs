//! `Compose` node (spec §4.6): produce the final assistant message.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;
use crate::state::TurnState;

pub const NODE_ID: &str = "compose";

const NO_RESEARCH_SYSTEM_PROMPT: &str = "Answer the user's message conversationally. Do not \
cite sources or fabricate references; you have no retrieved evidence to draw on.";

const RESEARCH_SYSTEM_PROMPT: &str = "Answer the user's message using only the evidence below. \
Do not fabricate facts or citations beyond what the evidence supports. Cite every claim drawn \
from evidence in the form (Source, Author, Title, Section X-Y), and end your reply with a \
References section listing every citation used.";

pub struct Compose {
    llm: Arc<dyn LlmClient>,
}

impl Compose {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Node<TurnState> for Compose {
    fn id(&self) -> &str {
        NODE_ID
    }

    async fn run(&self, mut state: TurnState, cancel: &CancellationToken) -> Result<(TurnState, Next), AgentError> {
        let span = info_span!("compose", research_iterations = state.research_iterations);
        let _enter = span.enter();

        let has_evidence = !state.query_results.is_empty();
        let system_prompt = if has_evidence {
            RESEARCH_SYSTEM_PROMPT
        } else {
            NO_RESEARCH_SYSTEM_PROMPT
        };

        let mut messages = vec![Message::system(system_prompt)];
        if has_evidence {
            let evidence = serde_json::to_string(&state.query_results).unwrap_or_default();
            messages.push(Message::system(format!("Evidence: {evidence}")));
        }
        messages.extend(state.conversation.iter().cloned());

        let response = match self
            .llm
            .invoke(&messages, Some(ReasoningEffort::Medium), ToolChoiceMode::None, cancel)
            .await
        {
            Ok(text) if !text.is_empty() => text,
            Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
            _ => fallback_response(has_evidence),
        };

        tracing::info!(has_evidence, response_len = response.len(), "composed response");
        state.response = response;
        Ok((state, Next::End))
    }
}

fn fallback_response(has_evidence: bool) -> String {
    if has_evidence {
        "I gathered some evidence but was unable to produce a grounded answer this turn.".to_string()
    } else {
        "I'm not able to produce a response right now.".to_string()
    }
}
