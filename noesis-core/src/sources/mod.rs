//! Source adapters: the two external collaborators `ExecuteQueries` fans out to.
//!
//! `vector` and `encyclopedia` are independently invoked pure-ish adapters (spec
//! §4.5); this module also carries the trait contracts for the backing stores
//! (embedding, vector search, author/title metadata) that the adapters are built
//! on, per spec §6. Only trait shapes are reused from the teacher's
//! `memory::Embedder`/`memory::Store` — persistent vector indexing itself is out
//! of scope (spec §1 Non-goals).

mod encyclopedia;
mod encyclopedia_http;
mod llm_section_selector;
mod metadata;
mod traits;
mod vector;

pub use encyclopedia::{split_into_sections, EncyclopediaAdapter, HeaderOrProse};
pub use encyclopedia_http::{HttpEncyclopedia, HTTP_TIMEOUT};
pub use llm_section_selector::LlmSectionSelector;
pub use metadata::{InMemoryMetadataStore, MetadataStore};
pub use traits::{
    ArticlePage, Embedder, Encyclopedia, ExactFilter, Section, SectionSelector, VectorHit,
    VectorQueryRequest, VectorStore,
};
pub use vector::{VectorAdapter, FUZZY_MATCH_THRESHOLD, VECTOR_LIMIT};
