//! Error taxonomy for the agent runtime.
//!
//! Variants follow the propagation policy: the engine recovers from tool
//! observations carrying an error string, but never from `LlmFatal`,
//! `ToolFatal`, `Cancelled` or `Internal`.  `Validation` and
//! `Configuration` are raised before any LLM spend.

use thiserror::Error;

/// Errors that can occur in the agent runtime.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed request: empty task, unknown preset, bad session id.
    /// Surfaced synchronously; never enters the engine.
    #[error("validation error: {0}")]
    Validation(String),

    /// Startup misconfiguration (e.g. sandbox mode with no base URL).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The LLM adapter exhausted its retries or hit a permanent provider
    /// error.  Terminates the task.
    #[error("LLM provider failure: {0}")]
    LlmFatal(String),

    /// A tool hit a condition the engine cannot observe past, e.g. the
    /// sandbox is permanently unreachable.  Terminates the task.
    #[error("fatal tool failure: {0}")]
    ToolFatal(String),

    /// User- or system-initiated cancellation; the cause string is preserved.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invariant violation (e.g. execution mode still `Unknown` at
    /// dispatch).  Startup should have prevented this.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for runtime operations.
pub type AgentResult<T> = Result<T, AgentError>;

impl AgentError {
    /// True for the error kinds the engine must not loop past.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::LlmFatal(_)
                | AgentError::ToolFatal(_)
                | AgentError::Internal(_)
                | AgentError::Cancelled(_)
        )
    }
}

/// Sanitize an API key for logging: first 5 and last 4 characters only.
pub fn sanitize_key(key: &str) -> String {
    if key.len() <= 9 {
        return "*".repeat(key.len());
    }
    format!("{}…{}", &key[..5], &key[key.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification() {
        assert!(AgentError::LlmFatal("x".into()).is_fatal());
        assert!(AgentError::ToolFatal("x".into()).is_fatal());
        assert!(AgentError::Internal("x".into()).is_fatal());
        assert!(AgentError::Cancelled("x".into()).is_fatal());
        assert!(!AgentError::Validation("x".into()).is_fatal());
        assert!(!AgentError::Configuration("x".into()).is_fatal());
    }

    #[test]
    fn sanitize_long_key() {
        let s = sanitize_key("sk-proj-abcdefghijklmnop1234");
        assert!(s.starts_with("sk-pr"));
        assert!(s.ends_with("1234"));
        assert!(!s.contains("abcdefghijklmnop"));
    }

    #[test]
    fn sanitize_short_key_fully_masked() {
        assert_eq!(sanitize_key("short"), "*****");
    }
}
