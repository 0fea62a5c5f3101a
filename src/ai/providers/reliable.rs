//! Retry policy over a provider chain.
//!
//! Transient failures (transport, rate limiting) are retried with capped
//! exponential backoff inside a per-provider attempt budget, then the next
//! provider in the chain gets its turn.  Permanent rejections abort the
//! whole call immediately — a bad request or auth failure will not get
//! better by retrying or switching providers, and silently rewriting the
//! request is not this layer's job.  Every decision is surfaced through
//! structured logs so exhaustion diagnoses stay readable.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::ai::provider::{LLMProvider, ProviderError, Result, StreamResponse};
use crate::ai::types::{CompletionRequest, CompletionResponse};

// ─── RetryPolicy ─────────────────────────────────────────────────────────────

/// Per-provider retry budget and backoff schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total tries per provider (first attempt included); at least 1.
    pub attempts: u32,
    /// Backoff before the first retry.
    pub base_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based), doubling up to the
    /// ceiling.  Rate-limit responses wait a full extra doubling.
    fn backoff(&self, retry: u32, rate_limited: bool) -> Duration {
        let shift = if rate_limited { retry + 1 } else { retry };
        let wait = self.base_backoff * 2u32.saturating_pow(shift);
        wait.min(self.max_backoff)
    }
}

// ─── ReliableProvider ────────────────────────────────────────────────────────

/// Applies a [`RetryPolicy`] across an ordered provider chain.  The first
/// entry is the primary; later entries are fallbacks engaged only after the
/// primary's transient budget is spent.
pub struct ReliableProvider {
    chain: Vec<Arc<dyn LLMProvider>>,
    policy: RetryPolicy,
}

impl ReliableProvider {
    pub fn new(primary: Arc<dyn LLMProvider>) -> Self {
        Self {
            chain: vec![primary],
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the whole retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = RetryPolicy {
            attempts: policy.attempts.max(1),
            ..policy
        };
        self
    }

    /// Set just the per-provider attempt budget.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.policy.attempts = attempts.max(1);
        self
    }

    /// Append a fallback provider to the chain.
    pub fn with_fallback(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.chain.push(provider);
        self
    }

    fn primary(&self) -> &Arc<dyn LLMProvider> {
        &self.chain[0]
    }
}

#[async_trait]
impl LLMProvider for ReliableProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let mut last_transient = None;

        for provider in &self.chain {
            let name = provider.provider_name();
            let mut rate_limited = false;

            for retry in 0..self.policy.attempts {
                if retry > 0 {
                    tokio::time::sleep(self.policy.backoff(retry - 1, rate_limited)).await;
                }
                match provider.complete(request.clone()).await {
                    Ok(response) => {
                        if retry > 0 {
                            log::info!("llm call recovered: provider={name} retry={retry}");
                        }
                        return Ok(response);
                    }
                    Err(e) if e.is_transient() => {
                        log::warn!(
                            "llm call transient failure: provider={name} try={}/{} error={e}",
                            retry + 1,
                            self.policy.attempts
                        );
                        rate_limited = matches!(e, ProviderError::RateLimited(_));
                        last_transient = Some(e);
                    }
                    Err(e) => {
                        log::error!("llm call rejected: provider={name} error={e}");
                        return Err(e);
                    }
                }
            }
            log::warn!(
                "llm retry budget exhausted: provider={name} attempts={}",
                self.policy.attempts
            );
        }

        Err(last_transient
            .unwrap_or_else(|| ProviderError::Transport("no providers configured".to_string())))
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamResponse> {
        // A broken stream cannot be resumed mid-flight, so each provider
        // gets a single try; transient failures move down the chain.
        let mut last_transient = None;
        for provider in &self.chain {
            match provider.stream(request.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_transient() => {
                    log::warn!(
                        "llm stream transient failure: provider={} error={e}",
                        provider.provider_name()
                    );
                    last_transient = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_transient
            .unwrap_or_else(|| ProviderError::Transport("no providers configured".to_string())))
    }

    /// The chain's smallest context window, so no request outgrows a
    /// fallback.
    fn context_limit(&self) -> usize {
        self.chain
            .iter()
            .map(|p| p.context_limit())
            .min()
            .unwrap_or(0)
    }

    fn model_id(&self) -> &str {
        self.primary().model_id()
    }

    fn provider_name(&self) -> &str {
        self.primary().provider_name()
    }

    /// Warm the whole chain so a fallback switch does not pay the first
    /// connection.  Failures are logged, not propagated.
    async fn warmup(&self) -> Result<()> {
        for provider in &self.chain {
            if let Err(e) = provider.warmup().await {
                log::warn!("warmup failed: provider={} error={e}", provider.provider_name());
            }
        }
        Ok(())
    }
}
