//! External-collaborator contracts for the vector-store side of retrieval (spec §6).
//!
//! These are trait-only boundaries: the core never implements embedding models or
//! vector indexing itself (spec §1 Non-goals), only the shapes adapters are built
//! against. `Embedder::embed` returns vectors in the same order as its input batch.

use async_trait::async_trait;

use crate::error::AgentError;
use crate::message::Message;

/// Produces one dense vector per input text, in the same order as the input batch.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AgentError>;
}

/// Exact-match filter applied to a vector-store query. Conjunction only (both
/// fields, if present, must match).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExactFilter {
    pub author: Option<String>,
    pub title: Option<String>,
}

/// One resolved hit from the vector store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorHit {
    /// Vector-store point id, used to dedup hits within one batch response.
    pub point_id: String,
    pub text: String,
    pub author: String,
    pub title: String,
    pub section: String,
}

/// One nearest-neighbor request within a `BatchQuery` call.
#[derive(Debug, Clone)]
pub struct VectorQueryRequest {
    pub vector: Vec<f32>,
    pub limit: usize,
    pub filter: Option<ExactFilter>,
}

/// `BatchQuery(requests) -> one hit list per request`, in request order.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn batch_query(
        &self,
        requests: &[VectorQueryRequest],
    ) -> Result<Vec<Vec<VectorHit>>, AgentError>;
}

/// Search-then-fetch surface for the external encyclopedia (spec §4.5.2/§6). Kept
/// as a trait so `EncyclopediaAdapter`'s section-selection algorithm is testable
/// without live HTTP, and so a real implementation can be swapped in by callers.
#[async_trait]
pub trait Encyclopedia: Send + Sync {
    /// Returns the first search result's (title, article url), or `None` if the
    /// search returned nothing.
    async fn search(&self, query: &str) -> Result<Option<(String, String)>, AgentError>;

    /// Fetches and parses one article: its citation metadata plus a flat list of
    /// (header, body text) sections in document order.
    async fn fetch_article(&self, url: &str) -> Result<ArticlePage, AgentError>;
}

/// One parsed encyclopedia article.
#[derive(Debug, Clone, Default)]
pub struct ArticlePage {
    pub title: String,
    pub authors: Vec<String>,
    pub publication_date: String,
    pub sections: Vec<Section>,
}

/// One header + prose section of an article.
#[derive(Debug, Clone)]
pub struct Section {
    pub header: String,
    pub text: String,
}

/// Picks which sections of an article are relevant to the user's intent. Backed by
/// the LLM collaborator in the real adapter; trait-seamed so the retry/fallback
/// logic in `EncyclopediaAdapter` can be unit tested against a stub.
#[async_trait]
pub trait SectionSelector: Send + Sync {
    /// Returns the indices (into `sections`) judged relevant, given recent
    /// conversation context for intent.
    async fn select(
        &self,
        sections: &[Section],
        conversation: &[Message],
    ) -> Result<Vec<usize>, AgentError>;
}

