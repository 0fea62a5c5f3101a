//! Provider implementations and the environment-driven factory.

pub mod openai_compatible;
pub mod reliable;
pub mod streaming;

pub use openai_compatible::{OpenAICompatibleConfig, OpenAICompatibleProvider};
pub use reliable::{ReliableProvider, RetryPolicy};
pub use streaming::StreamingProvider;

use std::sync::Arc;
use std::time::Duration;

use crate::config::ProviderConfig;
use crate::errors::{AgentError, AgentResult};

use super::provider::LLMProvider;

/// Creates an LLM client for a task, honouring a per-request selection.
///
/// A trait so tests can inject mock providers through the coordinator
/// without touching the network.
pub trait ProviderFactory: Send + Sync {
    /// `selection` is `"provider"` or `"provider:model"`; `None` uses the
    /// configured default.
    fn create(&self, selection: Option<&str>) -> AgentResult<Arc<dyn LLMProvider>>;
}

impl std::fmt::Debug for dyn ProviderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderFactory")
    }
}

/// Factory reading API keys from the environment.
pub struct EnvProviderFactory {
    config: ProviderConfig,
}

impl EnvProviderFactory {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    fn build(&self, provider_id: &str, model: Option<&str>) -> AgentResult<Arc<dyn LLMProvider>> {
        let mut cfg = match provider_id {
            "openai" => openai_compatible::OpenAICompatibleConfig::openai(require_env(
                "OPENAI_API_KEY",
                provider_id,
            )?),
            "openrouter" => openai_compatible::OpenAICompatibleConfig::openrouter(require_env(
                "OPENROUTER_API_KEY",
                provider_id,
            )?),
            "deepseek" => openai_compatible::OpenAICompatibleConfig::deepseek(require_env(
                "DEEPSEEK_API_KEY",
                provider_id,
            )?),
            "ollama" => openai_compatible::OpenAICompatibleConfig::ollama(),
            other => {
                return Err(AgentError::Validation(format!(
                    "unknown LLM provider '{other}'. Valid options: openai, openrouter, \
                     deepseek, ollama"
                )))
            }
        };

        cfg = cfg.timeout(Duration::from_secs(self.config.request_timeout_secs));

        if let Some(model) = model {
            cfg = cfg.default_model(model);
        } else if provider_id == self.config.default_id {
            cfg = cfg.default_model(self.config.default_model.clone());
        }

        // The wire client makes single classified attempts; the wrapper
        // owns the whole retry budget.
        let primary = OpenAICompatibleProvider::new(cfg, provider_id)?;
        let reliable =
            ReliableProvider::new(Arc::new(primary)).with_attempts(self.config.max_retries);
        Ok(Arc::new(reliable))
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn create(&self, selection: Option<&str>) -> AgentResult<Arc<dyn LLMProvider>> {
        let selection = selection
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_id.clone());
        let (provider_id, model) = match selection.split_once(':') {
            Some((provider, model)) => (provider.to_string(), Some(model.to_string())),
            None => (selection, None),
        };
        self.build(&provider_id, model.as_deref())
    }
}

fn require_env(key: &str, provider: &str) -> AgentResult<String> {
    std::env::var(key).map_err(|_| {
        AgentError::Configuration(format!("provider '{provider}' requires {key} to be set"))
    })
}
