//! Tunable turn-execution parameters, loaded from the process environment with the
//! design-value defaults from spec §6 (the teacher's ambient config layer reads
//! strings out of `std::env` the same way; this layer adds typed parsing and
//! validation on top since these particular keys gate loop bounds and timeouts).
//!
//! Call [`noesis_config::load_and_apply`] first if environment values may come from
//! `.env`/XDG `config.toml`; [`AgentConfig::from_env`] only reads the process
//! environment itself. Load once at startup and share via `Arc`; it is not re-read
//! mid-turn.

use std::time::Duration;

use crate::error::AgentError;

/// Turn-execution tunables (spec §6's configuration table). Every field has a
/// design-value default and may be overridden by an identically-named environment
/// variable.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Token threshold above which `PrepareConversation` summarizes history.
    pub history_token_limit: usize,
    /// Hard conversation-token cap checked by `PlanResearch`.
    pub context_token_cap: usize,
    /// Iteration cap for SIMPLE effort.
    pub max_iter_simple: u32,
    /// Iteration cap for DEEP effort.
    pub max_iter_deep: u32,
    /// Author/source-title fuzzy-match score floor.
    pub fuzzy_match_threshold: f32,
    /// Retries for the effort classifier's single-digit protocol.
    pub classifier_max_attempts: u32,
    /// JSON parse retries in `PlanResearch`.
    pub planner_max_parse_attempts: u32,
    /// Per-outbound-HTTP-request timeout in the encyclopedia adapter.
    pub http_timeout: Duration,
    /// Concurrent source-adapter tasks launched by `ExecuteQueries`.
    pub fan_out_workers: usize,
    /// Nearest-neighbor hits requested per vector query.
    pub vector_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_token_limit: 10_000,
            context_token_cap: 100_000,
            max_iter_simple: 4,
            max_iter_deep: 8,
            fuzzy_match_threshold: 80.0,
            classifier_max_attempts: 3,
            planner_max_parse_attempts: 5,
            http_timeout: Duration::from_secs(10),
            fan_out_workers: 2,
            vector_limit: 1,
        }
    }
}

impl AgentConfig {
    /// Loads every field from its environment variable (same name as the spec key),
    /// falling back to the design-value default when unset, then validates. Rejects
    /// non-positive iteration caps and a non-positive HTTP timeout (spec §6a).
    pub fn from_env() -> Result<Self, AgentError> {
        let defaults = Self::default();
        let cfg = Self {
            history_token_limit: env_usize("HISTORY_TOKEN_LIMIT", defaults.history_token_limit)?,
            context_token_cap: env_usize("CONTEXT_TOKEN_CAP", defaults.context_token_cap)?,
            max_iter_simple: env_u32("MAX_ITER_SIMPLE", defaults.max_iter_simple)?,
            max_iter_deep: env_u32("MAX_ITER_DEEP", defaults.max_iter_deep)?,
            fuzzy_match_threshold: env_f32("FUZZY_MATCH_THRESHOLD", defaults.fuzzy_match_threshold)?,
            classifier_max_attempts: env_u32("CLASSIFIER_MAX_ATTEMPTS", defaults.classifier_max_attempts)?,
            planner_max_parse_attempts: env_u32(
                "PLANNER_MAX_PARSE_ATTEMPTS",
                defaults.planner_max_parse_attempts,
            )?,
            http_timeout: Duration::from_secs(env_u64("HTTP_TIMEOUT", defaults.http_timeout.as_secs())?),
            fan_out_workers: env_usize("FAN_OUT_WORKERS", defaults.fan_out_workers)?,
            vector_limit: env_usize("VECTOR_LIMIT", defaults.vector_limit)?,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), AgentError> {
        if self.max_iter_simple == 0 {
            return invalid("MAX_ITER_SIMPLE", "must be positive");
        }
        if self.max_iter_deep == 0 {
            return invalid("MAX_ITER_DEEP", "must be positive");
        }
        if self.classifier_max_attempts == 0 {
            return invalid("CLASSIFIER_MAX_ATTEMPTS", "must be positive");
        }
        if self.planner_max_parse_attempts == 0 {
            return invalid("PLANNER_MAX_PARSE_ATTEMPTS", "must be positive");
        }
        if self.http_timeout.is_zero() {
            return invalid("HTTP_TIMEOUT", "must be positive");
        }
        if self.fan_out_workers == 0 {
            return invalid("FAN_OUT_WORKERS", "must be positive");
        }
        if self.vector_limit == 0 {
            return invalid("VECTOR_LIMIT", "must be positive");
        }
        if self.history_token_limit == 0 {
            return invalid("HISTORY_TOKEN_LIMIT", "must be positive");
        }
        if self.context_token_cap == 0 {
            return invalid("CONTEXT_TOKEN_CAP", "must be positive");
        }
        Ok(())
    }
}

fn invalid(key: &str, reason: &str) -> Result<(), AgentError> {
    Err(AgentError::ConfigInvalid {
        key: key.to_string(),
        reason: reason.to_string(),
    })
}

fn env_usize(key: &str, default: usize) -> Result<usize, AgentError> {
    parse_env(key, default)
}

fn env_u32(key: &str, default: u32) -> Result<u32, AgentError> {
    parse_env(key, default)
}

fn env_u64(key: &str, default: u64) -> Result<u64, AgentError> {
    parse_env(key, default)
}

fn env_f32(key: &str, default: f32) -> Result<f32, AgentError> {
    parse_env(key, default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AgentError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| AgentError::ConfigInvalid {
            key: key.to_string(),
            reason: format!("could not parse \"{raw}\""),
        }),
        Err(_) => Ok(default),
    }
}
