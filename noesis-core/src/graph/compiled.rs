//! Executable graph produced by `StateGraph::compile`.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

use super::conditional::NextEntry;
use super::next::Next;
use super::node::Node;
use super::state_graph::END;

/// A validated, immutable graph ready to run turns through `invoke`.
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_node_id: String,
    pub(super) next_map: HashMap<String, NextEntry<S>>,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Runs the graph from START to END (or until a node returns `Next::End`),
    /// threading `state` through each node in turn. See `invoke_cancellable` for a
    /// version that honors a per-turn cancellation signal between node steps.
    pub async fn invoke(&self, state: S) -> Result<S, AgentError> {
        self.invoke_cancellable(state, &CancellationToken::new())
            .await
    }

    /// Runs the graph, checking `cancel` before every node step. If cancellation is
    /// observed, returns `AgentError::Cancelled` immediately with no further nodes run
    /// (spec §4.7/§5: in-flight work is abandoned, partial state is discarded).
    pub async fn invoke_cancellable(
        &self,
        mut state: S,
        cancel: &CancellationToken,
    ) -> Result<S, AgentError> {
        let mut current = self.first_node_id.clone();
        loop {
            if cancel.is_cancelled() {
                tracing::info!(next_node = %current, "turn cancelled, abandoning remaining nodes");
                return Err(AgentError::Cancelled);
            }
            let node = self
                .nodes
                .get(&current)
                .unwrap_or_else(|| panic!("compiled graph missing node {current:?}"));
            let (next_state, next) = node.run(state, cancel).await?;
            state = next_state;
            current = match next {
                Next::End => return Ok(state),
                Next::Node(id) => id,
                Next::Continue => match self.next_map.get(&current) {
                    Some(entry) => entry.resolve(&state),
                    None => return Ok(state),
                },
            };
            if current == END {
                return Ok(state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, START};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default)]
    struct Counter(i32);

    struct Increment;

    #[async_trait]
    impl Node<Counter> for Increment {
        fn id(&self) -> &str {
            "increment"
        }
        async fn run(&self, state: Counter, _cancel: &CancellationToken) -> Result<(Counter, Next), AgentError> {
            Ok((Counter(state.0 + 1), Next::Continue))
        }
    }

    /// **Scenario**: a single-node linear chain runs once and returns the updated state.
    #[tokio::test]
    async fn invoke_single_node_chain() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("increment", Arc::new(Increment))
            .add_edge(START, "increment")
            .add_edge("increment", END);
        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(Counter(0)).await.unwrap();
        assert_eq!(result.0, 1);
    }

    struct LoopUntilThree(Arc<AtomicUsize>);

    #[async_trait]
    impl Node<Counter> for LoopUntilThree {
        fn id(&self) -> &str {
            "loop"
        }
        async fn run(&self, state: Counter, _cancel: &CancellationToken) -> Result<(Counter, Next), AgentError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok((Counter(state.0 + 1), Next::Continue))
        }
    }

    /// **Scenario**: conditional edges can route a node back to itself until a predicate holds.
    #[tokio::test]
    async fn invoke_follows_conditional_loop_until_done() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("loop", Arc::new(LoopUntilThree(calls.clone())))
            .add_edge(START, "loop")
            .add_conditional_edges(
                "loop",
                Arc::new(|s: &Counter| if s.0 >= 3 { END.to_string() } else { "loop".to_string() }),
                None,
            );
        let compiled = graph.compile().unwrap();
        let result = compiled.invoke(Counter(0)).await.unwrap();
        assert_eq!(result.0, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// **Scenario**: cancelling before invoke returns Cancelled and runs no node.
    #[tokio::test]
    async fn invoke_cancellable_returns_cancelled_when_already_cancelled() {
        let mut graph = StateGraph::<Counter>::new();
        graph
            .add_node("increment", Arc::new(Increment))
            .add_edge(START, "increment")
            .add_edge("increment", END);
        let compiled = graph.compile().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = compiled.invoke_cancellable(Counter(0), &cancel).await;
        assert!(matches!(result, Err(AgentError::Cancelled)));
    }
}
