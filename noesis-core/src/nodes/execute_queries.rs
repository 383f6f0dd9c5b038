//! `ExecuteQueries` node (spec §4.4): fan the planned queries out to the two
//! source adapters, dedup, and append to the evidence log.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::info_span;

use crate::error::AgentError;
use crate::graph::{Next, Node};
use crate::message::Message;
use crate::sources::{EncyclopediaAdapter, VectorAdapter};
use crate::state::{OriginatingQuery, QueryAndFilters, QueryResult, ResultPayload, TurnState, SOURCE_ENCYCLOPEDIA, SOURCE_VECTOR_DB};

pub const NODE_ID: &str = "execute_queries";

/// Concurrent source-adapter tasks launched per call (spec `FAN_OUT_WORKERS`, also validated
/// as a positive `AgentConfig` field at startup). There are always exactly two named sources
/// (vector, encyclopedia) fanned out here by name, not by a resizable worker pool, so this
/// node reads the constant rather than the config field.
pub const FAN_OUT_WORKERS: usize = 2;

pub struct ExecuteQueries {
    vector: Arc<VectorAdapter>,
    encyclopedia: Arc<EncyclopediaAdapter>,
}

impl ExecuteQueries {
    pub fn new(vector: Arc<VectorAdapter>, encyclopedia: Arc<EncyclopediaAdapter>) -> Self {
        Self { vector, encyclopedia }
    }
}

#[async_trait]
impl Node<TurnState> for ExecuteQueries {
    fn id(&self) -> &str {
        NODE_ID
    }

    async fn run(&self, mut state: TurnState, cancel: &CancellationToken) -> Result<(TurnState, Next), AgentError> {
        let span = info_span!("execute_queries", research_iterations = state.research_iterations);
        let _enter = span.enter();

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let planned_vector = state.vector_db_queries.take().unwrap_or_default();
        let planned_sep = state.sep_queries.take().unwrap_or_default();

        let (vector_queries, vector_dupes) =
            dedup_planned_queries(planned_vector, SOURCE_VECTOR_DB, &state.query_results, |q| {
                OriginatingQuery::Vector(q.clone())
            });
        let (sep_queries, sep_dupes) =
            dedup_planned_queries(planned_sep, SOURCE_ENCYCLOPEDIA, &state.query_results, |q| {
                OriginatingQuery::Encyclopedia(q.clone())
            });
        state.query_results.extend(vector_dupes);
        state.query_results.extend(sep_dupes);

        let conversation = state.conversation.clone();
        let mut set: JoinSet<Vec<QueryResult>> = JoinSet::new();
        if !vector_queries.is_empty() {
            let adapter = self.vector.clone();
            let queries = vector_queries.clone();
            set.spawn(async move { adapter.query(&queries).await.unwrap_or_default() });
        }
        if !sep_queries.is_empty() {
            let adapter = self.encyclopedia.clone();
            let queries = sep_queries.clone();
            set.spawn(async move { adapter.query(&queries, &conversation).await.unwrap_or_default() });
        }

        let mut fetched = Vec::new();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("execute_queries cancelled, aborting in-flight source fan-out");
                    set.abort_all();
                    while set.join_next().await.is_some() {}
                    return Err(AgentError::Cancelled);
                }
                joined = set.join_next() => {
                    match joined {
                        Some(Ok(mut results)) => fetched.append(&mut results),
                        Some(Err(_)) => {
                            // Task panicked: treated as no results from that source this iteration.
                        }
                        None => break,
                    }
                }
            }
        }

        let mut vector_count = 0;
        let mut encyclopedia_count = 0;
        for mut result in fetched {
            dedup_result_text(&mut result, &mut state.all_raw_results);
            match result.source.as_str() {
                SOURCE_VECTOR_DB => vector_count += 1,
                SOURCE_ENCYCLOPEDIA => encyclopedia_count += 1,
                _ => {}
            }
            state.query_results.push(result);
        }
        tracing::info!(vector_count, encyclopedia_count, "execute_queries fan-in complete");

        Ok((state, Next::Continue))
    }
}

/// Removes already-queried entries from `planned`, returning the remainder to
/// execute plus a placeholder `QueryResult` per duplicate (spec §4.4
/// pre-execution dedup).
fn dedup_planned_queries<Q: Clone>(
    planned: Vec<Q>,
    source: &str,
    existing: &[QueryResult],
    to_originating: impl Fn(&Q) -> OriginatingQuery,
) -> (Vec<Q>, Vec<QueryResult>) {
    let mut remaining = Vec::new();
    let mut duplicates = Vec::new();
    for q in planned {
        let originating = to_originating(&q);
        let already_queried = existing
            .iter()
            .any(|r| r.source == source && same_query_text(&r.query, &originating));
        if already_queried {
            duplicates.push(QueryResult::new(
                originating,
                source,
                ResultPayload::Sentinel(ResultPayload::DUPLICATE_QUERY.to_string()),
            ));
        } else {
            remaining.push(q);
        }
    }
    (remaining, duplicates)
}

fn same_query_text(a: &OriginatingQuery, b: &OriginatingQuery) -> bool {
    a.text() == b.text()
}

/// Rewrites `result.result` to the `DUPLICATE_RESULT` sentinel if its raw key was
/// already seen, otherwise records the key (spec §4.4 result-level dedup).
fn dedup_result_text(
    result: &mut QueryResult,
    all_raw_results: &mut std::collections::HashSet<String>,
) {
    let Some(key) = result.result.raw_key().map(str::to_string) else {
        return;
    };
    if !all_raw_results.insert(key) {
        result.result = ResultPayload::Sentinel(ResultPayload::DUPLICATE_RESULT.to_string());
    }
}
