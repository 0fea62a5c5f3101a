//! Application configuration: TOML schema and loader.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_default_config};
pub use schema::{
    AgentConfig, AppConfig, ContextConfig, ExecutionModeSetting, ProviderConfig, SandboxConfig,
    ServerConfig,
};
