//! Turn execution error types.
//!
//! Returned across node and adapter boundaries. Per the propagation policy, only
//! `Cancelled` is allowed to escape a running turn; every other variant is caught
//! at the point it is produced and converted into a degraded-but-valid state update.

use thiserror::Error;

/// Error surfaced by a node, adapter, or graph compilation step.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Execution failed with a message (e.g. an adapter's internal invariant broke).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The LLM collaborator returned an error or an empty/unusable response.
    #[error("llm invocation failed: {0}")]
    LlmFailed(String),

    /// An outbound HTTP request failed (timeout, connection error, non-2xx status).
    #[error("http request failed: {0}")]
    HttpFailed(String),

    /// Structured output (classifier digit, planner JSON) could not be parsed after
    /// exhausting its retry budget.
    #[error("parse retries exhausted after {attempts} attempts: {reason}")]
    ParseExhausted { attempts: u32, reason: String },

    /// Graph compilation failed (see `graph::CompilationError`).
    #[error("graph compilation failed: {0}")]
    CompilationFailed(#[from] crate::graph::CompilationError),

    /// A tunable loaded from the environment failed validation (e.g. a non-positive
    /// iteration cap or timeout).
    #[error("invalid configuration for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    /// The caller cancelled the turn. The only variant allowed to propagate out of
    /// an in-flight turn rather than being recovered locally.
    #[error("turn cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Display format of ExecutionFailed contains "execution failed" and the message.
    #[test]
    fn agent_error_display_execution_failed() {
        let err = AgentError::ExecutionFailed("msg".to_string());
        let s = err.to_string();
        assert!(
            s.contains("execution failed"),
            "Display should contain 'execution failed': {}",
            s
        );
        assert!(s.contains("msg"), "Display should contain message: {}", s);
    }

    /// **Scenario**: Debug format includes variant name and message.
    #[test]
    fn agent_error_debug_format() {
        let err = AgentError::ExecutionFailed("test".to_string());
        let s = format!("{:?}", err);
        assert!(
            s.contains("ExecutionFailed"),
            "Debug should contain variant name: {}",
            s
        );
        assert!(s.contains("test"), "Debug should contain message: {}", s);
    }

    /// **Scenario**: ParseExhausted renders the attempt count and reason.
    #[test]
    fn parse_exhausted_display_contains_attempts_and_reason() {
        let err = AgentError::ParseExhausted {
            attempts: 5,
            reason: "unexpected token".to_string(),
        };
        let s = err.to_string();
        assert!(s.contains('5'));
        assert!(s.contains("unexpected token"));
    }

    /// **Scenario**: Cancelled has a stable, unparameterized message.
    #[test]
    fn cancelled_display() {
        assert_eq!(AgentError::Cancelled.to_string(), "turn cancelled");
    }
}
