//! The LLM capability bundle: completion, streaming, model identity.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use super::types::{CompletionRequest, CompletionResponse, StreamChunk};

// ─── ProviderError ───────────────────────────────────────────────────────────

/// Classified provider-layer failure.
///
/// The split drives the retry policy: transient failures may be retried
/// within a budget, permanent ones fail the call immediately.  Whatever
/// survives the policy is promoted to `LlmFatal` by the coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network-level failure: connect refused, timeout, 5xx.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider asked us to slow down (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Permanent rejection: bad request, auth failure, unknown model.
    /// Retrying the same request cannot help.
    #[error("provider rejected request: {0}")]
    Rejected(String),

    /// A response arrived but could not be interpreted.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// True when a retry of the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Transport(_) | ProviderError::RateLimited(_)
        )
    }
}

/// Result type at the provider layer.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Type alias for a streaming response.
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<StreamChunk>> + Send>>;

// ─── LLMProvider ─────────────────────────────────────────────────────────────

/// Trait for LLM providers.
///
/// Implementations must honour request cancellation through the underlying
/// HTTP client (dropping the future aborts the request).
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Complete a conversation and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Stream a completion response.
    async fn stream(&self, request: CompletionRequest) -> Result<StreamResponse>;

    /// Context window limit for this provider, in tokens.
    fn context_limit(&self) -> usize;

    /// Default model identifier for this provider.
    fn model_id(&self) -> &str;

    /// Stable provider name (`"openai"`, `"openrouter"`, …).
    fn provider_name(&self) -> &str;

    /// Pre-establish connection to the provider.  Default no-op.
    async fn warmup(&self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LLMProvider")
            .field("provider_name", &self.provider_name())
            .field("model_id", &self.model_id())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ProviderError::Transport("connect refused".into()).is_transient());
        assert!(ProviderError::RateLimited("429".into()).is_transient());
        assert!(!ProviderError::Rejected("bad model".into()).is_transient());
        assert!(!ProviderError::Malformed("truncated json".into()).is_transient());
    }
}
