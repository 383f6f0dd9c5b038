//! LLM invocation surface (spec §6): explicitly out of core scope as an
//! *implementation*, but the trait contract and the tool-call-suppression
//! invariant every call site must honor live here.
//!
//! `reasoning_effort` is threaded through because every call site in this core
//! passes one; `invoke` returns plain text only (structured content blocks are
//! the collaborator's job to collapse, per spec §6).

mod mock;

pub use mock::MockLlm;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::message::Message;

/// Reasoning-effort hint passed through to the underlying model, when supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningEffort {
    Low,
    #[default]
    Medium,
    High,
}

/// Tool choice mode for chat completions. Every call site in this core passes
/// `ToolChoiceMode::None` (spec §9 "Tool-call suppression"); the variants for
/// `Auto`/`Required` exist only so the trait mirrors a real provider's surface,
/// and so an implementation can assert it was never asked for anything else.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ToolChoiceMode {
    #[default]
    Auto,
    None,
    Required,
}

/// LLM client: given messages and a reasoning-effort hint, returns a single text
/// reply with tool calls disabled.
///
/// **Interaction**: used by every node that prompts the model
/// (`ClassifyEffort`, `PlanResearch`, `PrepareConversation`'s summarizer,
/// `Compose`, and the encyclopedia adapter's section selector). Implementations
/// must collapse any structured content blocks the underlying provider returns
/// into a single text string, and must treat an attempted tool call as an empty
/// text response (spec §9) so the caller's retry/fallback path fires.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Invokes one turn. `reasoning_effort` is an optional hint; implementations
    /// that don't support it may ignore it. `tool_choice` must be honored —
    /// every call site in this core passes `ToolChoiceMode::None`, and an
    /// implementation backed by a real provider must forward it as the
    /// provider's tool-choice parameter rather than silently dropping it.
    /// `cancel` lets a slow call be abandoned promptly on turn cancellation;
    /// implementations that talk to a real provider over the network should
    /// race the request against `cancel.cancelled()`.
    async fn invoke(
        &self,
        messages: &[Message],
        reasoning_effort: Option<ReasoningEffort>,
        tool_choice: ToolChoiceMode,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError>;
}
