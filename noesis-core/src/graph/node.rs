//! Graph node trait: one step in a StateGraph.
//!
//! Receives state `S`, returns updated `S` and `Next` (continue, jump, or end).
//! Used by `StateGraph` and `CompiledStateGraph`.

use async_trait::async_trait;
use std::fmt::Debug;

use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

use super::Next;

/// One step in a graph: state in, (state out, next step).
///
/// **Interaction**: implemented by each of the seven turn nodes. See
/// `StateGraph::add_node` and `CompiledStateGraph::invoke`.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Node id (e.g. `"plan_research"`). Must be unique within a graph.
    fn id(&self) -> &str;

    /// One step: state in, (state out, next step).
    ///
    /// `cancel` is the turn's cancellation signal; nodes that await long-running
    /// work (LLM calls, fan-out to source adapters) should race it rather than
    /// only relying on `CompiledStateGraph`'s between-node check, so a cancelled
    /// turn returns promptly instead of waiting out whatever node is in flight.
    ///
    /// Return `Next::Continue` to follow the linear edge order (or the conditional
    /// router, if this node has one); `Next::Node(id)` to jump to a node; `Next::End`
    /// to stop. Nodes must never propagate an error across this boundary except for
    /// `AgentError::Cancelled` (spec §7 propagation policy) — every other failure is
    /// caught internally and turned into a degraded-but-valid state update.
    async fn run(&self, state: S, cancel: &CancellationToken) -> Result<(S, Next), AgentError>;
}
