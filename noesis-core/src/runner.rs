//! Turn runner: wires the seven nodes into the fixed graph of spec §2 and
//! exposes the turn's public entry point.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::graph::{CompiledStateGraph, Node, StateGraph, END, START};
use crate::llm::LlmClient;
use crate::message::Message;
use crate::nodes::{ClassifyEffort, Compose, ExecuteQueries, PlanResearch, PrepareConversation};
use crate::sources::{EncyclopediaAdapter, VectorAdapter};
use crate::state::{EffortTier, QueryResult, TurnState};

/// The result of one completed turn (spec §6: `(response, query_results, research_effort)`).
pub struct TurnOutcome {
    pub response: String,
    pub query_results: Vec<QueryResult>,
    pub research_effort: EffortTier,
}

/// Builds and runs the compiled turn graph.
///
/// **Interaction**: the only place the seven nodes of §2 are assembled into one
/// executable graph; construct once (it is immutable) and call `run`/`run_cancellable`
/// once per turn.
pub struct Runner {
    graph: CompiledStateGraph<TurnState>,
}

impl Runner {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        vector: Arc<VectorAdapter>,
        encyclopedia: Arc<EncyclopediaAdapter>,
        cfg: Arc<AgentConfig>,
    ) -> Self {
        let mut graph = StateGraph::<TurnState>::new();

        let prepare: Arc<dyn Node<TurnState>> = Arc::new(PrepareConversation::new(llm.clone(), cfg.clone()));
        let classify: Arc<dyn Node<TurnState>> = Arc::new(ClassifyEffort::new(llm.clone(), cfg.clone()));
        let plan: Arc<dyn Node<TurnState>> = Arc::new(PlanResearch::new(llm.clone(), cfg));
        let execute: Arc<dyn Node<TurnState>> = Arc::new(ExecuteQueries::new(vector, encyclopedia));
        let compose: Arc<dyn Node<TurnState>> = Arc::new(Compose::new(llm));

        graph.add_node(prepare.id(), prepare.clone());
        graph.add_node(classify.id(), classify.clone());
        graph.add_node(plan.id(), plan.clone());
        graph.add_node(execute.id(), execute.clone());
        graph.add_node(compose.id(), compose.clone());

        let plan_id = plan.id().to_string();
        let execute_id = execute.id().to_string();
        let compose_id = compose.id().to_string();

        graph.add_edge(START, prepare.id());
        graph.add_edge(prepare.id(), classify.id());

        graph.add_conditional_edges(
            classify.id(),
            Arc::new({
                let plan_id = plan_id.clone();
                let compose_id = compose_id.clone();
                move |s: &TurnState| {
                    if matches!(s.research_effort, EffortTier::None) {
                        compose_id.clone()
                    } else {
                        plan_id.clone()
                    }
                }
            }),
            None,
        );

        graph.add_conditional_edges(
            plan.id(),
            Arc::new(move |s: &TurnState| {
                if s.completed {
                    compose_id.clone()
                } else {
                    execute_id.clone()
                }
            }),
            None,
        );

        graph.add_edge(execute.id(), plan_id);
        graph.add_edge(compose.id(), END);

        let compiled = graph
            .compile()
            .expect("turn graph is a fixed, internally-consistent topology");

        Self { graph: compiled }
    }

    /// Runs one turn with no cancellation support. See `run_cancellable` for the
    /// cancellable variant used by long-running hosts.
    pub async fn run(&self, conversation: Vec<Message>) -> Result<TurnOutcome, AgentError> {
        self.run_cancellable(conversation, &CancellationToken::new()).await
    }

    /// Runs one turn, honoring `cancel` between node steps (spec §4.7/§5). On
    /// cancellation, returns `Err(AgentError::Cancelled)` with whatever partial
    /// state existed discarded.
    pub async fn run_cancellable(
        &self,
        conversation: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let state = TurnState::with_conversation(conversation);
        let final_state = self.graph.invoke_cancellable(state, cancel).await?;
        Ok(TurnOutcome {
            response: final_state.response,
            query_results: final_state.query_results,
            research_effort: final_state.research_effort,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlm;
    use crate::sources::{
        ArticlePage, Embedder, Encyclopedia, InMemoryMetadataStore, SectionSelector, VectorHit,
        VectorQueryRequest, VectorStore,
    };
    use async_trait::async_trait;

    struct StubEmbedder;
    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    struct EmptyVectorStore;
    #[async_trait]
    impl VectorStore for EmptyVectorStore {
        async fn batch_query(
            &self,
            requests: &[VectorQueryRequest],
        ) -> Result<Vec<Vec<VectorHit>>, AgentError> {
            Ok(requests.iter().map(|_| Vec::new()).collect())
        }
    }

    struct NoHitsEncyclopedia;
    #[async_trait]
    impl Encyclopedia for NoHitsEncyclopedia {
        async fn search(&self, _q: &str) -> Result<Option<(String, String)>, AgentError> {
            Ok(None)
        }
        async fn fetch_article(&self, _url: &str) -> Result<ArticlePage, AgentError> {
            unreachable!()
        }
    }

    struct NeverSelector;
    #[async_trait]
    impl SectionSelector for NeverSelector {
        async fn select(
            &self,
            _sections: &[crate::sources::Section],
            _conversation: &[Message],
        ) -> Result<Vec<usize>, AgentError> {
            Ok(Vec::new())
        }
    }

    fn test_runner(replies: Vec<String>) -> Runner {
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlm::new(replies));
        let cfg = Arc::new(AgentConfig::default());
        let vector = Arc::new(VectorAdapter::new(
            Arc::new(StubEmbedder),
            Arc::new(EmptyVectorStore),
            Arc::new(InMemoryMetadataStore::new(vec![])),
            cfg.clone(),
        ));
        let encyclopedia = Arc::new(EncyclopediaAdapter::new(Arc::new(NoHitsEncyclopedia), Arc::new(NeverSelector)));
        Runner::new(llm, vector, encyclopedia, cfg)
    }

    /// **Scenario** (S1): classifier returns NONE; Compose runs once with empty evidence.
    #[tokio::test]
    async fn none_effort_short_circuits_to_compose() {
        let runner = test_runner(vec!["0".to_string(), "hello!".to_string()]);
        let outcome = runner.run(vec![Message::user("hi")]).await.unwrap();
        assert!(matches!(outcome.research_effort, EffortTier::None));
        assert!(outcome.query_results.is_empty());
        assert_eq!(outcome.response, "hello!");
    }

    /// **Scenario** (S6): classifier returns SIMPLE; planner fails to parse on every
    /// attempt, forcing completion with no ExecuteQueries fan-out.
    #[tokio::test]
    async fn planner_parse_failure_completes_without_execute_queries() {
        let mut replies = vec!["1".to_string()];
        replies.extend(std::iter::repeat("not json".to_string()).take(5));
        replies.push("a best-effort reply".to_string());
        let runner = test_runner(replies);
        let outcome = runner.run(vec![Message::user("tell me about virtue")]).await.unwrap();
        assert!(matches!(outcome.research_effort, EffortTier::Simple));
        assert!(outcome.query_results.is_empty());
        assert_eq!(outcome.response, "a best-effort reply");
    }

    /// **Scenario**: cancelling before the turn starts returns `Cancelled` immediately.
    #[tokio::test]
    async fn cancelled_before_start_returns_cancelled() {
        let runner = test_runner(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = runner.run_cancellable(vec![Message::user("hi")], &cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }
}
