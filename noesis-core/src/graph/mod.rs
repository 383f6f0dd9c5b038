//! State graph: nodes, linear and conditional edges, compile and invoke.
//!
//! Add nodes with `add_node`, wire the fixed edge set with `add_edge` (using
//! `START`/`END` sentinels) and `add_conditional_edges` for state-based routing,
//! then `compile()` to get a `CompiledStateGraph` and `invoke()` it with a state.

mod compile_error;
mod compiled;
mod conditional;
mod next;
mod node;
mod state_graph;

pub use compile_error::CompilationError;
pub use compiled::CompiledStateGraph;
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use next::Next;
pub use node::Node;
pub use state_graph::{StateGraph, END, START};
