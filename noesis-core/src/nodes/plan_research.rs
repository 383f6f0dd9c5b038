//! `PlanResearch` node (spec §4.3): decide whether to stop, what to query next,
//! and which prior results to prune.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::llm::{LlmClient, ReasoningEffort, ToolChoiceMode};
use crate::message::Message;
use crate::state::{EffortTier, QueryAndFilters, ResultPayload, TurnState};
use crate::token_count::count_conversation_tokens;

pub const NODE_ID: &str = "plan_research";

/// Iteration cap for SIMPLE effort (spec `MAX_ITER_SIMPLE`; default, overridable via `AgentConfig`).
pub const MAX_ITER_SIMPLE: u32 = 4;
/// Iteration cap for DEEP effort (spec `MAX_ITER_DEEP`; default, overridable via `AgentConfig`).
pub const MAX_ITER_DEEP: u32 = 8;
/// Hard cap on conversation token count; exceeding it ends research (spec `CONTEXT_TOKEN_CAP`;
/// default, overridable via `AgentConfig`).
pub const CONTEXT_TOKEN_CAP: usize = 100_000;
/// JSON parse retries before giving up on this iteration's plan (spec `PLANNER_MAX_PARSE_ATTEMPTS`;
/// default, overridable via `AgentConfig`).
pub const PLANNER_MAX_PARSE_ATTEMPTS: u32 = 5;

const SYSTEM_PROMPT: &str = "You plan research for a philosophical question. Given the \
conversation, the evidence gathered so far, and the current plan, decide whether to continue \
researching or stop. Reply with only a JSON object with these fields: \
\"long_term_plan\" (string), \"short_term_plan\" (string), \
\"vector_db_queries\" (array of {\"query\": string, \"filters\": {\"author\": string?, \
\"source_title\": string?}?} or null), \
\"stanford_encyclopedia_queries\" (array of strings or null), \
\"ids_to_remove\" (array of result-id strings or null). \
Emit at most 3 vector_db_queries and at most 1 stanford_encyclopedia_query per reply. \
If research is complete, set every field to null or empty.";

pub struct PlanResearch {
    llm: Arc<dyn LlmClient>,
    cfg: Arc<AgentConfig>,
}

impl PlanResearch {
    pub fn new(llm: Arc<dyn LlmClient>, cfg: Arc<AgentConfig>) -> Self {
        Self { llm, cfg }
    }
}

#[derive(Debug, Deserialize, Default)]
struct PlannerReply {
    #[serde(default)]
    long_term_plan: Option<String>,
    #[serde(default)]
    short_term_plan: Option<String>,
    #[serde(default)]
    vector_db_queries: Option<Vec<QueryAndFilters>>,
    #[serde(default)]
    stanford_encyclopedia_queries: Option<Vec<String>>,
    #[serde(default)]
    ids_to_remove: Option<Vec<String>>,
}

impl PlannerReply {
    fn is_all_empty(&self) -> bool {
        self.long_term_plan.as_deref().unwrap_or("").is_empty()
            && self.short_term_plan.as_deref().unwrap_or("").is_empty()
            && self.vector_db_queries.as_ref().map_or(true, |v| v.is_empty())
            && self
                .stanford_encyclopedia_queries
                .as_ref()
                .map_or(true, |v| v.is_empty())
    }
}

#[async_trait]
impl Node<TurnState> for PlanResearch {
    fn id(&self) -> &str {
        NODE_ID
    }

    async fn run(&self, mut state: TurnState, cancel: &CancellationToken) -> Result<(TurnState, Next), AgentError> {
        let span = info_span!("plan_research", research_iterations = state.research_iterations);
        let _enter = span.enter();

        let cap = match state.research_effort {
            EffortTier::Deep => self.cfg.max_iter_deep,
            _ => self.cfg.max_iter_simple,
        };
        if state.research_iterations > cap {
            tracing::info!(cap, "iteration cap reached, completing");
            state.completed = true;
            return Ok((state, Next::Continue));
        }

        let context_tokens = count_conversation_tokens(&state.conversation);
        if context_tokens > self.cfg.context_token_cap {
            tracing::info!(context_tokens, "context token cap exceeded, completing");
            state.completed = true;
            return Ok((state, Next::Continue));
        }

        let prompt = render_prompt(&state, cap);
        let messages = vec![Message::system(SYSTEM_PROMPT), Message::user(prompt)];

        let mut reply = None;
        for attempt in 1..=self.cfg.planner_max_parse_attempts {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let text = match self
                .llm
                .invoke(&messages, Some(ReasoningEffort::Medium), ToolChoiceMode::None, cancel)
                .await
            {
                Err(AgentError::Cancelled) => return Err(AgentError::Cancelled),
                Err(_) => continue,
                Ok(text) => text,
            };
            if let Some(parsed) = parse_reply(&text) {
                tracing::info!(attempt, "planner reply parsed");
                reply = Some(parsed);
                break;
            }
        }

        let Some(reply) = reply else {
            tracing::info!(
                attempts = self.cfg.planner_max_parse_attempts,
                "planner parse retries exhausted, completing"
            );
            state.completed = true;
            return Ok((state, Next::Continue));
        };

        apply_pruning(&mut state, reply.ids_to_remove.as_deref().unwrap_or(&[]));

        if reply.is_all_empty() {
            state.completed = true;
            return Ok((state, Next::Continue));
        }

        state.long_term_plan = reply.long_term_plan.unwrap_or_default();
        state.short_term_plan = reply.short_term_plan.unwrap_or_default();
        state.vector_db_queries = reply.vector_db_queries.filter(|v| !v.is_empty());
        state.sep_queries = reply.stanford_encyclopedia_queries.filter(|v| !v.is_empty());
        state.research_iterations += 1;

        Ok((state, Next::Continue))
    }
}

fn render_prompt(state: &TurnState, cap: u32) -> String {
    let last_message = state
        .last_message()
        .map(|m| format!("{m:?}"))
        .unwrap_or_default();
    let evidence = serde_json::to_string(&state.query_results).unwrap_or_default();
    format!(
        "Last message: {last_message}\n\
         Iteration {} of {cap}\n\
         Long-term plan: {}\n\
         Previous short-term plan: {}\n\
         Evidence so far: {evidence}",
        state.research_iterations, state.long_term_plan, state.short_term_plan
    )
}

/// Strips a ```/```json fence and attempts to parse the planner's JSON object.
fn parse_reply(text: &str) -> Option<PlannerReply> {
    let stripped = strip_fence(text);
    serde_json::from_str(stripped).ok()
}

fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Rewrites each pruned id's `result` to the `PRUNED` sentinel in place, without
/// touching `all_raw_results` (spec §4.3: the dedup surface stays intact).
fn apply_pruning(state: &mut TurnState, ids_to_remove: &[String]) {
    for raw_id in ids_to_remove {
        let Ok(id) = uuid::Uuid::parse_str(raw_id) else {
            continue;
        };
        if let Some(entry) = state.query_results.iter_mut().find(|r| r.id == id) {
            entry.result = ResultPayload::Sentinel(ResultPayload::PRUNED.to_string());
        }
    }
}
