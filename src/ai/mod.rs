//! LLM abstraction: conversation types, the provider trait, and provider
//! implementations.

pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{LLMProvider, ProviderError, StreamResponse};
pub use providers::{EnvProviderFactory, ProviderFactory, ReliableProvider, StreamingProvider};
