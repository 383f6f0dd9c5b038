//! Encyclopedia source adapter (spec §4.5.2).
//!
//! For each search string, concurrently: search, fetch the first result's article,
//! split it into header-delimited sections, ask the LLM which sections are
//! relevant, and build one `QueryResult` per selected section. Grounded on
//! `original_source/ai/research_agent/sources/sep.py`'s search→fetch→extract
//! pipeline; the section-split-then-LLM-pick-sections step is new (the original
//! always takes the whole article) per spec §4.5.2.

use std::sync::Arc;

use tokio::task::JoinSet;

use crate::error::AgentError;
use crate::message::Message;
use crate::sources::traits::{ArticlePage, Encyclopedia, Section, SectionSelector};
use crate::state::{Citation, OriginatingQuery, QueryResult, ResultPayload, SOURCE_ENCYCLOPEDIA};

/// Retries for section-fetch/selection parse failures before falling back to the
/// article's first three sections (spec §4.5.2).
const SECTION_SELECT_MAX_ATTEMPTS: u32 = 3;
/// Fallback section count when section selection never parses.
const FALLBACK_SECTION_COUNT: usize = 3;

pub struct EncyclopediaAdapter {
    source: Arc<dyn Encyclopedia>,
    selector: Arc<dyn SectionSelector>,
}

impl EncyclopediaAdapter {
    pub fn new(source: Arc<dyn Encyclopedia>, selector: Arc<dyn SectionSelector>) -> Self {
        Self { source, selector }
    }

    /// Runs all `queries` concurrently (one task per search string, all joined
    /// before returning); a failure in one task never aborts the others (spec
    /// §4.5: "failures from any sub-task are swallowed at the adapter boundary").
    pub async fn query(
        &self,
        queries: &[String],
        conversation: &[Message],
    ) -> Result<Vec<QueryResult>, AgentError> {
        let mut set = JoinSet::new();
        for query in queries.iter().cloned() {
            let source = self.source.clone();
            let selector = self.selector.clone();
            let conversation = conversation.to_vec();
            set.spawn(async move {
                run_one_query(source.as_ref(), selector.as_ref(), &query, &conversation).await
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(mut r)) => results.append(&mut r),
                Ok(Err(_)) | Err(_) => {
                    // Transient error or task panic: no results from this search this iteration.
                }
            }
        }
        Ok(results)
    }
}

async fn run_one_query(
    source: &dyn Encyclopedia,
    selector: &dyn SectionSelector,
    query: &str,
    conversation: &[Message],
) -> Result<Vec<QueryResult>, AgentError> {
    let Some((_, url)) = source.search(query).await? else {
        return Ok(Vec::new());
    };
    let article = source.fetch_article(&url).await?;
    if article.sections.is_empty() {
        return Ok(Vec::new());
    }

    let indices = select_sections(selector, &article, conversation).await;

    let citation_authors = article.authors.clone();
    let results = indices
        .into_iter()
        .filter_map(|i| article.sections.get(i))
        .map(|section| {
            QueryResult::new(
                OriginatingQuery::Encyclopedia(query.to_string()),
                SOURCE_ENCYCLOPEDIA,
                ResultPayload::Found {
                    text: format!("{}\n\n{}", section.header, section.text),
                    citation: Citation {
                        source: SOURCE_ENCYCLOPEDIA.to_string(),
                        authors: citation_authors.clone(),
                        title: article.title.clone(),
                        section: section.header.clone(),
                    },
                },
            )
        })
        .collect();
    Ok(results)
}

/// Retries the selector up to `SECTION_SELECT_MAX_ATTEMPTS` times; on exhaustion,
/// falls back to the article's first three sections (spec §4.5.2).
async fn select_sections(
    selector: &dyn SectionSelector,
    article: &ArticlePage,
    conversation: &[Message],
) -> Vec<usize> {
    for _ in 0..SECTION_SELECT_MAX_ATTEMPTS {
        if let Ok(indices) = selector.select(&article.sections, conversation).await {
            if !indices.is_empty() {
                return indices;
            }
        }
    }
    (0..article.sections.len().min(FALLBACK_SECTION_COUNT)).collect()
}

/// Splits an article's flat children (alternating header tags and prose, per spec
/// §6) into `Section`s, one per header. Exposed for `Encyclopedia` implementations
/// to reuse when parsing `<div id="main-text">`-style content.
pub fn split_into_sections(children: &[(HeaderOrProse, String)]) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut current_header = String::new();
    let mut current_text = String::new();

    for (kind, content) in children {
        match kind {
            HeaderOrProse::Header => {
                if !current_header.is_empty() || !current_text.is_empty() {
                    sections.push(Section {
                        header: current_header.clone(),
                        text: current_text.trim().to_string(),
                    });
                }
                current_header = content.clone();
                current_text.clear();
            }
            HeaderOrProse::Prose => {
                if !current_text.is_empty() {
                    current_text.push_str("\n\n");
                }
                current_text.push_str(content);
            }
        }
    }
    if !current_header.is_empty() || !current_text.is_empty() {
        sections.push(Section {
            header: current_header,
            text: current_text.trim().to_string(),
        });
    }
    sections
}

/// Tag for one child element of an article's main content, as classified from its
/// HTML tag name (`h1`–`h6` vs. everything else).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOrProse {
    Header,
    Prose,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct StubEncyclopedia {
        page: ArticlePage,
    }

    #[async_trait]
    impl Encyclopedia for StubEncyclopedia {
        async fn search(&self, _query: &str) -> Result<Option<(String, String)>, AgentError> {
            Ok(Some(("Free Will".to_string(), "https://example/free-will".to_string())))
        }
        async fn fetch_article(&self, _url: &str) -> Result<ArticlePage, AgentError> {
            Ok(self.page.clone())
        }
    }

    struct AlwaysRelevantSelector;

    #[async_trait]
    impl SectionSelector for AlwaysRelevantSelector {
        async fn select(
            &self,
            sections: &[Section],
            _conversation: &[Message],
        ) -> Result<Vec<usize>, AgentError> {
            Ok((0..sections.len()).collect())
        }
    }

    struct FailingSelector(AtomicUsize);

    #[async_trait]
    impl SectionSelector for FailingSelector {
        async fn select(
            &self,
            _sections: &[Section],
            _conversation: &[Message],
        ) -> Result<Vec<usize>, AgentError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(AgentError::ParseExhausted {
                attempts: 1,
                reason: "bad json".into(),
            })
        }
    }

    fn sample_article() -> ArticlePage {
        ArticlePage {
            title: "Free Will".to_string(),
            authors: vec!["Timothy O'Connor".to_string()],
            publication_date: "2016".to_string(),
            sections: vec![
                Section {
                    header: "1. Introduction".to_string(),
                    text: "Free will is...".to_string(),
                },
                Section {
                    header: "2. Compatibilism".to_string(),
                    text: "Compatibilists hold...".to_string(),
                },
            ],
        }
    }

    /// **Scenario**: a successful search+fetch+select produces one QueryResult per selected section.
    #[tokio::test]
    async fn query_produces_one_result_per_selected_section() {
        let adapter = EncyclopediaAdapter::new(
            Arc::new(StubEncyclopedia { page: sample_article() }),
            Arc::new(AlwaysRelevantSelector),
        );
        let results = adapter
            .query(&["free will".to_string()], &[Message::user("hi")])
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        for r in &results {
            assert_eq!(r.source, SOURCE_ENCYCLOPEDIA);
            assert!(matches!(r.result, ResultPayload::Found { .. }));
        }
    }

    /// **Scenario**: selector failing on every attempt falls back to the first three sections.
    #[tokio::test]
    async fn select_sections_falls_back_after_exhausting_retries() {
        let failing = Arc::new(FailingSelector(AtomicUsize::new(0)));
        let article = sample_article();
        let indices = select_sections(failing.as_ref(), &article, &[]).await;
        assert_eq!(indices, vec![0, 1]); // article only has 2 sections, fallback clamps to len
        assert_eq!(failing.0.load(Ordering::SeqCst), SECTION_SELECT_MAX_ATTEMPTS);
    }

    /// **Scenario**: a search miss (no results) yields no QueryResults, not an error.
    #[tokio::test]
    async fn search_miss_yields_no_results() {
        struct NoHits;
        #[async_trait]
        impl Encyclopedia for NoHits {
            async fn search(&self, _q: &str) -> Result<Option<(String, String)>, AgentError> {
                Ok(None)
            }
            async fn fetch_article(&self, _url: &str) -> Result<ArticlePage, AgentError> {
                unreachable!("no url to fetch when search misses")
            }
        }
        let adapter = EncyclopediaAdapter::new(Arc::new(NoHits), Arc::new(AlwaysRelevantSelector));
        let results = adapter.query(&["nonsense query".to_string()], &[]).await.unwrap();
        assert!(results.is_empty());
    }

    /// **Scenario**: one failing query task does not prevent another's results from being returned (spec §4.5 partial failure).
    #[tokio::test]
    async fn one_failing_query_does_not_abort_others() {
        struct FlakySource(Mutex<u32>, ArticlePage);
        #[async_trait]
        impl Encyclopedia for FlakySource {
            async fn search(&self, query: &str) -> Result<Option<(String, String)>, AgentError> {
                if query == "bad" {
                    return Err(AgentError::HttpFailed("timeout".into()));
                }
                Ok(Some(("ok".to_string(), "https://example/ok".to_string())))
            }
            async fn fetch_article(&self, _url: &str) -> Result<ArticlePage, AgentError> {
                Ok(self.1.clone())
            }
        }
        let source = Arc::new(FlakySource(Mutex::new(0), sample_article()));
        let adapter = EncyclopediaAdapter::new(source, Arc::new(AlwaysRelevantSelector));
        let results = adapter
            .query(&["bad".to_string(), "good".to_string()], &[])
            .await
            .unwrap();
        assert_eq!(results.len(), 2); // only "good" contributes, 2 sections
    }

    /// **Scenario**: header/prose children split into sections, each text joining
    /// consecutive prose blocks with a blank line.
    #[test]
    fn split_into_sections_groups_prose_under_preceding_header() {
        let children = vec![
            (HeaderOrProse::Header, "1. Intro".to_string()),
            (HeaderOrProse::Prose, "first paragraph".to_string()),
            (HeaderOrProse::Prose, "second paragraph".to_string()),
            (HeaderOrProse::Header, "2. Body".to_string()),
            (HeaderOrProse::Prose, "body text".to_string()),
        ];
        let sections = split_into_sections(&children);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header, "1. Intro");
        assert_eq!(sections[0].text, "first paragraph\n\nsecond paragraph");
        assert_eq!(sections[1].header, "2. Body");
        assert_eq!(sections[1].text, "body text");
    }
}
