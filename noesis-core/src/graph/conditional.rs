//! Conditional routing: a function from state to a routing key, plus an optional
//! key → node-id map.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

/// `(state) -> routing key`. The key is either a node id directly, or looked up
/// in a `path_map` when one is supplied to `add_conditional_edges`.
pub type ConditionalRouterFn<S> = Arc<dyn Fn(&S) -> String + Send + Sync>;

/// A router function paired with its optional path map, stored per source node.
pub struct ConditionalRouter<S> {
    pub path: ConditionalRouterFn<S>,
    pub path_map: Option<HashMap<String, String>>,
}

impl<S> ConditionalRouter<S> {
    pub fn new(path: ConditionalRouterFn<S>, path_map: Option<HashMap<String, String>>) -> Self {
        Self { path, path_map }
    }
}

impl<S> Clone for ConditionalRouter<S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            path_map: self.path_map.clone(),
        }
    }
}

/// Resolved routing for one node: either an unconditional next id, or a
/// conditional router evaluated against the post-run state.
pub enum NextEntry<S> {
    Unconditional(String),
    Conditional(ConditionalRouter<S>),
}

impl<S> Clone for NextEntry<S> {
    fn clone(&self) -> Self {
        match self {
            NextEntry::Unconditional(s) => NextEntry::Unconditional(s.clone()),
            NextEntry::Conditional(r) => NextEntry::Conditional(r.clone()),
        }
    }
}

impl<S: Debug> NextEntry<S> {
    /// Resolves the next node id (or END) for this entry given the post-run state.
    ///
    /// For a conditional entry, `path(state)` yields a key; if `path_map` is set
    /// the key is looked up there (falling back to the raw key if absent from the
    /// map), otherwise the key itself is the next node id.
    pub fn resolve(&self, state: &S) -> String {
        match self {
            NextEntry::Unconditional(next) => next.clone(),
            NextEntry::Conditional(router) => {
                let key = (router.path)(state);
                match &router.path_map {
                    Some(map) => map.get(&key).cloned().unwrap_or(key),
                    None => key,
                }
            }
        }
    }
}
