//! Metadata store: the process-wide author→sources mapping the vector adapter
//! fuzzy-matches against (spec §6).
//!
//! Read-only from the core's perspective. A real implementation refreshes its
//! cached snapshot from a database NOTIFY channel (spec §5); this module only
//! defines the trait readers use plus an in-memory implementation for tests and
//! for callers with no such backing store.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Snapshot-consistent read of the known (author, source_title) universe.
///
/// Implementations must serve `known_authors`/`sources_for_author` from a single
/// atomically-swapped snapshot per call (spec §5: "readers get a consistent
/// snapshot per query"), not by re-querying a live connection mid-call.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// All known author names, sorted and deduplicated.
    async fn known_authors(&self) -> Vec<String>;

    /// All known source titles. When `author` is `Some`, scoped to that author's
    /// sources only (spec §4.5.1 step 2: "scoped to the resolved author's sources
    /// if an author was resolved, else to all sources").
    async fn known_sources(&self, author: Option<&str>) -> Vec<String>;
}

/// In-memory `MetadataStore` backed by a snapshot swapped in by a background
/// refresher task (spec §5/§9: "the refresher atomically swaps in a new map").
pub struct InMemoryMetadataStore {
    snapshot: RwLock<Arc<Snapshot>>,
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    /// (author, source_title) pairs, sorted and deduplicated.
    pairs: Vec<(String, String)>,
}

impl InMemoryMetadataStore {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Snapshot {
                pairs: sorted_dedup(pairs),
            })),
        }
    }

    /// Atomically swaps in a freshly observed set of pairs. Called by the
    /// background NOTIFY listener; never touches `TurnState`.
    pub async fn refresh(&self, pairs: Vec<(String, String)>) {
        let snapshot = Arc::new(Snapshot {
            pairs: sorted_dedup(pairs),
        });
        *self.snapshot.write().await = snapshot;
    }
}

fn sorted_dedup(mut pairs: Vec<(String, String)>) -> Vec<(String, String)> {
    pairs.sort();
    pairs.dedup();
    pairs
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn known_authors(&self) -> Vec<String> {
        let snapshot = self.snapshot.read().await.clone();
        let mut authors: Vec<String> = snapshot.pairs.iter().map(|(a, _)| a.clone()).collect();
        authors.sort();
        authors.dedup();
        authors
    }

    async fn known_sources(&self, author: Option<&str>) -> Vec<String> {
        let snapshot = self.snapshot.read().await.clone();
        let mut titles: Vec<String> = snapshot
            .pairs
            .iter()
            .filter(|(a, _)| author.map_or(true, |want| a == want))
            .map(|(_, t)| t.clone())
            .collect();
        titles.sort();
        titles.dedup();
        titles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: `known_sources(None)` returns every title across all authors, sorted.
    #[tokio::test]
    async fn known_sources_without_author_returns_all() {
        let store = InMemoryMetadataStore::new(vec![
            ("Thomas Hobbes".into(), "Leviathan".into()),
            ("John Locke".into(), "Two Treatises".into()),
        ]);
        let titles = store.known_sources(None).await;
        assert_eq!(titles, vec!["Leviathan".to_string(), "Two Treatises".to_string()]);
    }

    /// **Scenario**: `known_sources(Some(author))` scopes to that author's sources only.
    #[tokio::test]
    async fn known_sources_scoped_to_author() {
        let store = InMemoryMetadataStore::new(vec![
            ("Thomas Hobbes".into(), "Leviathan".into()),
            ("Thomas Hobbes".into(), "De Cive".into()),
            ("John Locke".into(), "Two Treatises".into()),
        ]);
        let titles = store.known_sources(Some("Thomas Hobbes")).await;
        assert_eq!(titles, vec!["De Cive".to_string(), "Leviathan".to_string()]);
    }

    /// **Scenario**: `refresh` atomically replaces the snapshot; readers after refresh see only the new data.
    #[tokio::test]
    async fn refresh_replaces_snapshot() {
        let store = InMemoryMetadataStore::new(vec![("A".into(), "X".into())]);
        store.refresh(vec![("B".into(), "Y".into())]).await;
        assert_eq!(store.known_authors().await, vec!["B".to_string()]);
        assert_eq!(store.known_sources(None).await, vec!["Y".to_string()]);
    }

    /// **Scenario**: duplicate pairs are deduplicated in both author and source listings.
    #[tokio::test]
    async fn duplicates_are_deduplicated() {
        let store = InMemoryMetadataStore::new(vec![
            ("A".into(), "X".into()),
            ("A".into(), "X".into()),
        ]);
        assert_eq!(store.known_authors().await, vec!["A".to_string()]);
        assert_eq!(store.known_sources(None).await, vec!["X".to_string()]);
    }
}
