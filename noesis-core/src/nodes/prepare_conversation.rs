//! `PrepareConversation` node (spec §4.1): bound the incoming conversation's
//! size and initialize a fresh `TurnState`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::compress::summarize_if_needed;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::state::TurnState;

pub const NODE_ID: &str = "prepare_conversation";

pub struct PrepareConversation {
    llm: Arc<dyn LlmClient>,
    cfg: Arc<AgentConfig>,
}

impl PrepareConversation {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: Arc<AgentConfig>) -> Self {
        Self { llm, cfg }
    }
}

#[async_trait]
impl Node<TurnState> for PrepareConversation {
    fn id(&self) -> &str {
        NODE_ID
    }

    async fn run(&self, state: TurnState, cancel: &CancellationToken) -> Result<(TurnState, Next), AgentError> {
        let span = info_span!("prepare_conversation", research_iterations = state.research_iterations);
        let _enter = span.enter();

        let conversation: Vec<Message> = summarize_if_needed(
            state.conversation,
            &self.llm,
            self.cfg.history_token_limit,
            cancel,
        )
        .await;
        tracing::info!(message_count = conversation.len(), "conversation prepared");

        Ok((TurnState::with_conversation(conversation), Next::Continue))
    }
}
