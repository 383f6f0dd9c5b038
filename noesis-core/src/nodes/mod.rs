//! The seven graph nodes of one turn (spec §2/§4), wired together by `runner`.

mod classify_effort;
mod compose;
mod execute_queries;
mod plan_research;
mod prepare_conversation;

pub use classify_effort::{ClassifyEffort, CLASSIFIER_MAX_ATTEMPTS};
pub use compose::Compose;
pub use execute_queries::{ExecuteQueries, FAN_OUT_WORKERS};
pub use plan_research::{PlanResearch, CONTEXT_TOKEN_CAP, MAX_ITER_DEEP, MAX_ITER_SIMPLE, PLANNER_MAX_PARSE_ATTEMPTS};
pub use prepare_conversation::PrepareConversation;
