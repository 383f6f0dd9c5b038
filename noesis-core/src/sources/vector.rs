//! Vector-store source adapter (spec §4.5.1).
//!
//! For each planned `QueryAndFilters`: fuzzy-resolve `filters.author` and
//! `filters.source_title` against the metadata store's cached snapshot, batch-embed
//! the remaining query texts, then issue one batched nearest-neighbor search with
//! the resolved exact-match filters.
//!
//! Fuzzy matching uses `nucleo_matcher`; the match score is normalized against
//! the query's score against itself (best-in-batch normalization is meaningless
//! for a single-candidate batch), giving a stable 0-100-ish scale comparable to
//! `FUZZY_MATCH_THRESHOLD`.

use std::sync::Arc;

use nucleo_matcher::pattern::{CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::sources::metadata::MetadataStore;
use crate::sources::traits::{Embedder, ExactFilter, VectorQueryRequest, VectorStore};
use crate::state::{
    Citation, OriginatingQuery, QueryAndFilters, QueryResult, ResultPayload, SOURCE_VECTOR_DB,
};

/// Score floor below which a fuzzy match is treated as "not found" (spec
/// `FUZZY_MATCH_THRESHOLD`, design value 80; default, overridable via `AgentConfig`).
pub const FUZZY_MATCH_THRESHOLD: f32 = 80.0;

/// Nearest-neighbor hits per vector query (spec `VECTOR_LIMIT`; default, overridable via
/// `AgentConfig`).
pub const VECTOR_LIMIT: usize = 1;

pub struct VectorAdapter {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    metadata: Arc<dyn MetadataStore>,
    cfg: Arc<AgentConfig>,
}

impl VectorAdapter {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        metadata: Arc<dyn MetadataStore>,
        cfg: Arc<AgentConfig>,
    ) -> Self {
        Self {
            embedder,
            store,
            metadata,
            cfg,
        }
    }

    /// Runs the planned vector queries per spec §4.5.1, producing one `QueryResult`
    /// per returned hit plus one diagnostic `QueryResult` per fuzzy-match miss.
    pub async fn query(&self, queries: &[QueryAndFilters]) -> Result<Vec<QueryResult>, AgentError> {
        let mut diagnostics = Vec::new();
        let mut resolvable = Vec::new();

        for q in queries {
            match self.resolve_filters(q).await {
                FilterResolution::Resolved(filter) => resolvable.push((q.clone(), filter)),
                FilterResolution::Miss(diagnostic) => {
                    diagnostics.push(QueryResult::new(
                        OriginatingQuery::Vector(q.clone()),
                        SOURCE_VECTOR_DB,
                        ResultPayload::Sentinel(diagnostic),
                    ));
                }
            }
        }

        if resolvable.is_empty() {
            return Ok(diagnostics);
        }

        let texts: Vec<String> = resolvable.iter().map(|(q, _)| q.query.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let requests: Vec<VectorQueryRequest> = vectors
            .into_iter()
            .zip(resolvable.iter())
            .map(|(vector, (_, filter))| VectorQueryRequest {
                vector,
                limit: self.cfg.vector_limit,
                filter: filter.clone(),
            })
            .collect();

        let batch = self.store.batch_query(&requests).await?;

        let mut results = diagnostics;
        let mut seen_point_ids = std::collections::HashSet::new();
        for ((q, _), hits) in resolvable.into_iter().zip(batch.into_iter()) {
            for hit in hits {
                if !seen_point_ids.insert(hit.point_id.clone()) {
                    continue;
                }
                results.push(QueryResult::new(
                    OriginatingQuery::Vector(q.clone()),
                    SOURCE_VECTOR_DB,
                    ResultPayload::Found {
                        text: hit.text,
                        citation: Citation {
                            source: SOURCE_VECTOR_DB.to_string(),
                            authors: vec![hit.author],
                            title: hit.title,
                            section: hit.section,
                        },
                    },
                ));
            }
        }
        Ok(results)
    }

    async fn resolve_filters(&self, q: &QueryAndFilters) -> FilterResolution {
        let Some(filters) = &q.filters else {
            return FilterResolution::Resolved(None);
        };

        let mut exact = ExactFilter::default();

        if let Some(author) = &filters.author {
            let candidates = self.metadata.known_authors().await;
            match best_match(author, &candidates) {
                Some((matched, score)) if score > self.cfg.fuzzy_match_threshold => exact.author = Some(matched),
                Some((closest, score)) => {
                    tracing::warn!(author = %author, closest = %closest, score = score as f64, "fuzzy author match below threshold");
                    return FilterResolution::Miss(format!(
                        "author \"{author}\" not found (closest match: \"{closest}\", score {score:.0})"
                    ));
                }
                None => {
                    tracing::warn!(author = %author, "no known authors to fuzzy-match against");
                    return FilterResolution::Miss(format!(
                        "author \"{author}\" not found (no known authors to compare against)"
                    ));
                }
            }
        }

        if let Some(title) = &filters.source_title {
            let scope = exact.author.as_deref();
            let candidates = self.metadata.known_sources(scope).await;
            match best_match(title, &candidates) {
                Some((matched, score)) if score > self.cfg.fuzzy_match_threshold => exact.title = Some(matched),
                Some((closest, score)) => {
                    tracing::warn!(title = %title, closest = %closest, score = score as f64, "fuzzy source-title match below threshold");
                    return FilterResolution::Miss(format!(
                        "source title \"{title}\" not found (closest match: \"{closest}\", score {score:.0})"
                    ));
                }
                None => {
                    tracing::warn!(title = %title, "no known sources to fuzzy-match against");
                    return FilterResolution::Miss(format!(
                        "source title \"{title}\" not found (no known sources to compare against)"
                    ));
                }
            }
        }

        FilterResolution::Resolved(Some(exact))
    }
}

enum FilterResolution {
    Resolved(Option<ExactFilter>),
    Miss(String),
}

/// Returns the best-scoring candidate and its normalized (0–100-ish) score, or
/// `None` if there are no candidates to compare against.
fn best_match(query: &str, candidates: &[String]) -> Option<(String, f32)> {
    if candidates.is_empty() {
        return None;
    }

    let mut matcher = Matcher::new(Config::DEFAULT);
    let pattern = Pattern::parse(query, CaseMatching::Ignore, Normalization::Smart);

    let self_score = pattern
        .match_list([query], &mut matcher)
        .into_iter()
        .next()
        .map(|(_, score)| score)
        .unwrap_or(1)
        .max(1);

    let best = pattern
        .match_list(candidates.iter().map(|c| c.as_str()), &mut matcher)
        .into_iter()
        .max_by_key(|(_, score)| *score)?;

    let normalized = (best.1 as f32 / self_score as f32) * 100.0;
    Some((best.0.to_string(), normalized))
}
