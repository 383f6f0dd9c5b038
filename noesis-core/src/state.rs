//! Turn state: the mutable record threaded through every node of one turn.
//!
//! A turn starts at `PrepareConversation` with a freshly defaulted `TurnState` and
//! ends at `Compose`, which is the only node permitted to write `response`. Every
//! other node reads the whole state and returns a new value that wholesale-replaces
//! it (see `graph::Node`); there is no field-level merge.

use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Effort tier assigned by `ClassifyEffort`; governs the iteration budget and which
/// Compose prompt discipline is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffortTier {
    /// No research: go straight to Compose with no evidence.
    None,
    /// Bounded research, `MAX_ITER_SIMPLE` iterations.
    Simple,
    /// Deeper research, `MAX_ITER_DEEP` iterations.
    Deep,
}

impl EffortTier {
    /// Parses the classifier's single-digit protocol: `0` -> None, `1` -> Simple, `2` -> Deep.
    pub fn from_digit(d: char) -> Option<Self> {
        match d {
            '0' => Some(Self::None),
            '1' => Some(Self::Simple),
            '2' => Some(Self::Deep),
            _ => None,
        }
    }
}

/// Optional filters narrowing a vector-store query to one author and/or source title.
///
/// Either, both, or neither field may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
}

/// A single planned vector-store query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryAndFilters {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<QueryFilters>,
}

/// Provenance of one retrieved chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Origin label, e.g. "Project Gutenberg" or "Stanford Encyclopedia of Philosophy".
    pub source: String,
    /// Ordered author names; may be empty.
    #[serde(default)]
    pub authors: Vec<String>,
    pub title: String,
    pub section: String,
}

/// The query that produced a `QueryResult`: either a vector-store query (with its
/// filters) or a bare encyclopedia search string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OriginatingQuery {
    Vector(QueryAndFilters),
    Encyclopedia(String),
}

impl OriginatingQuery {
    /// The raw query text, regardless of which source it targeted.
    pub fn text(&self) -> &str {
        match self {
            OriginatingQuery::Vector(q) => &q.query,
            OriginatingQuery::Encyclopedia(s) => s,
        }
    }
}

/// `QueryResult::result`: a tagged sum of exactly three arms. Modeled as an enum
/// (not an open object bag) because dedup and pruning both discriminate on the arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultPayload {
    /// A retrieved chunk of text with its citation.
    Found { text: String, citation: Citation },
    /// A sentinel marking a duplicate query/result, a prune, or a fuzzy-match miss.
    Sentinel(String),
    /// No result at all.
    Null,
}

impl ResultPayload {
    /// Sentinel emitted by `ExecuteQueries`'s pre-fan-out query dedup.
    pub const DUPLICATE_QUERY: &'static str =
        "[Duplicate Query Omitted, Already Retrieved In Previous Queries]";
    /// Sentinel emitted by `ExecuteQueries`'s post-fan-in result-text dedup.
    pub const DUPLICATE_RESULT: &'static str =
        "[Duplicate Result Omitted, Already Retrieved In Previous Queries]";
    /// Sentinel written by `PlanResearch` pruning (`ids_to_remove`).
    pub const PRUNED: &'static str = "[Removed from future consideration by research planner]";

    /// The raw-text dedup key for this payload, if it carries text at all.
    /// `Found` keys on its chunk text; `Sentinel` keys on the sentinel string itself
    /// (matching the spec's "if a string, use the string" rule) so that re-deriving
    /// a sentinel never collides with a `Found` payload's real text.
    pub fn raw_key(&self) -> Option<&str> {
        match self {
            ResultPayload::Found { text, .. } => Some(text),
            ResultPayload::Sentinel(s) => Some(s),
            ResultPayload::Null => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, ResultPayload::Sentinel(_))
    }
}

/// One unit of evidence accumulated across iterations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Process-wide unique identifier (spec: "a random 128-bit identifier").
    pub id: uuid::Uuid,
    pub query: OriginatingQuery,
    pub source: String,
    pub result: ResultPayload,
}

impl QueryResult {
    pub fn new(query: OriginatingQuery, source: impl Into<String>, result: ResultPayload) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            query,
            source: source.into(),
            result,
        }
    }
}

/// Label for the vector-store source, used both as `QueryResult::source` and as the
/// `Citation::source` default for Project Gutenberg hits.
pub const SOURCE_VECTOR_DB: &str = "Project Gutenberg Vector DB";
/// Label for the encyclopedia source.
pub const SOURCE_ENCYCLOPEDIA: &str = "Stanford Encyclopedia of Philosophy";

/// The mutable record threaded through the graph for one turn (spec §3).
#[derive(Debug, Clone)]
pub struct TurnState {
    pub conversation: Vec<Message>,
    pub research_effort: EffortTier,
    pub long_term_plan: String,
    pub short_term_plan: String,
    pub vector_db_queries: Option<Vec<QueryAndFilters>>,
    pub sep_queries: Option<Vec<String>>,
    /// 1-indexed counter of planning iterations consumed.
    pub research_iterations: u32,
    /// Terminal flag: planner has decided to stop (or a budget was exhausted).
    pub completed: bool,
    pub query_results: Vec<QueryResult>,
    /// Dedup index: raw-text keys already seen by `ExecuteQueries`.
    pub all_raw_results: std::collections::HashSet<String>,
    /// Final assistant text; written only by `Compose`.
    pub response: String,
}

impl TurnState {
    /// Builds a fresh `TurnState` from an already-prepared conversation, with every
    /// other field at its `PrepareConversation` default (spec §4.1).
    pub fn with_conversation(conversation: Vec<Message>) -> Self {
        Self {
            conversation,
            research_effort: EffortTier::None,
            long_term_plan: String::new(),
            short_term_plan: String::new(),
            vector_db_queries: None,
            sep_queries: None,
            research_iterations: 1,
            completed: false,
            query_results: Vec::new(),
            all_raw_results: std::collections::HashSet::new(),
            response: String::new(),
        }
    }

    /// The most recent message in the conversation, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.conversation.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: `with_conversation` sets every default named in spec §4.1.
    #[test]
    fn with_conversation_sets_spec_defaults() {
        let convo = vec![Message::user("hi")];
        let state = TurnState::with_conversation(convo.clone());
        assert_eq!(state.research_iterations, 1);
        assert!(!state.completed);
        assert!(matches!(state.research_effort, EffortTier::None));
        assert!(state.query_results.is_empty());
        assert!(state.all_raw_results.is_empty());
        assert_eq!(state.response, "");
        assert!(state.vector_db_queries.is_none());
        assert!(state.sep_queries.is_none());
        assert_eq!(state.conversation.len(), convo.len());
    }

    /// **Scenario**: classifier digit parsing maps 0/1/2 and rejects anything else.
    #[test]
    fn effort_tier_from_digit() {
        assert!(matches!(EffortTier::from_digit('0'), Some(EffortTier::None)));
        assert!(matches!(
            EffortTier::from_digit('1'),
            Some(EffortTier::Simple)
        ));
        assert!(matches!(EffortTier::from_digit('2'), Some(EffortTier::Deep)));
        assert!(EffortTier::from_digit('9').is_none());
        assert!(EffortTier::from_digit('x').is_none());
    }

    /// **Scenario**: `raw_key` keys `Found` on chunk text and `Sentinel` on the sentinel string,
    /// and returns `None` for `Null` (dedup invariant: every stored non-placeholder result
    /// has a raw key; placeholders still participate so re-querying hits the placeholder path).
    #[test]
    fn result_payload_raw_key() {
        let found = ResultPayload::Found {
            text: "the text".into(),
            citation: Citation {
                source: "x".into(),
                authors: vec![],
                title: "t".into(),
                section: "s".into(),
            },
        };
        assert_eq!(found.raw_key(), Some("the text"));
        assert!(!found.is_placeholder());

        let sentinel = ResultPayload::Sentinel(ResultPayload::DUPLICATE_QUERY.to_string());
        assert_eq!(sentinel.raw_key(), Some(ResultPayload::DUPLICATE_QUERY));
        assert!(sentinel.is_placeholder());

        assert_eq!(ResultPayload::Null.raw_key(), None);
    }

    /// **Scenario**: `QueryResult::new` assigns a fresh uuid on every call (uniqueness invariant).
    #[test]
    fn query_result_ids_are_unique() {
        let a = QueryResult::new(
            OriginatingQuery::Encyclopedia("q".into()),
            SOURCE_ENCYCLOPEDIA,
            ResultPayload::Null,
        );
        let b = QueryResult::new(
            OriginatingQuery::Encyclopedia("q".into()),
            SOURCE_ENCYCLOPEDIA,
            ResultPayload::Null,
        );
        assert_ne!(a.id, b.id);
    }
}
