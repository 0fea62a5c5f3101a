//! TOML configuration schema for Alex.
//!
//! All fields have `#[serde(default)]` so a partially-filled `config.toml`
//! works correctly.  Missing sections fall back to their `Default` impl.
//!
//! Example `~/.alex/config.toml`:
//! ```toml
//! [provider]
//! default_id = "openai"
//! default_model = "gpt-4o-mini"
//!
//! [agent]
//! max_iterations = 20
//!
//! [context]
//! max_tokens = 64000
//!
//! [sandbox]
//! base_url = "http://localhost:8194"
//!
//! [server]
//! port = 8080
//! ```

use serde::{Deserialize, Serialize};

// ─── ProviderConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    /// ID of the default LLM provider (`"openai"`, `"openrouter"`,
    /// `"deepseek"` or `"ollama"`).
    pub default_id: String,
    /// Default model identifier (e.g. `"gpt-4o-mini"`).
    pub default_model: String,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum retry attempts on transient errors.
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_id: "openai".to_owned(),
            default_model: "gpt-4o-mini".to_owned(),
            request_timeout_secs: 60,
            max_retries: 3,
        }
    }
}

// ─── ExecutionModeSetting ─────────────────────────────────────────────────────

/// Where file/shell tools run.  `Auto` derives the mode from the process
/// role at container build time: the CLI wires `local`, the server wires
/// `sandbox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModeSetting {
    #[default]
    Auto,
    Local,
    Sandbox,
}

impl std::str::FromStr for ExecutionModeSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(ExecutionModeSetting::Auto),
            "local" => Ok(ExecutionModeSetting::Local),
            "sandbox" => Ok(ExecutionModeSetting::Sandbox),
            _ => Err(format!(
                "unknown execution mode: {s}. Valid options: auto, local, sandbox"
            )),
        }
    }
}

// ─── SandboxConfig ───────────────────────────────────────────────────────────

/// Connection settings for the external sandbox HTTP service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Base URL of the sandbox service.  Required when the execution mode
    /// resolves to `sandbox`.
    pub base_url: Option<String>,
    /// Timeout for the initial health probe, in seconds.
    pub init_timeout_secs: u64,
    /// Default per-operation timeout, in seconds (overridable per tool).
    pub op_timeout_secs: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            init_timeout_secs: 10,
            op_timeout_secs: 30,
        }
    }
}

// ─── AgentConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Maximum Think/Act/Observe iterations before aborting a task.
    pub max_iterations: usize,
    /// Sampling temperature.  `None` uses the provider default.
    pub temperature: Option<f32>,
    /// Maximum tokens per LLM response.  `None` uses the provider default.
    pub max_tokens: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            temperature: Some(0.7),
            max_tokens: Some(4096),
        }
    }
}

// ─── ContextConfig ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Token budget for the conversation window.
    pub max_tokens: usize,
    /// Compression triggers at this percentage of the budget.
    pub compress_at_percent: usize,
    /// Compression targets this percentage of the budget.
    pub compress_target_percent: usize,
    /// Tool-result bodies older than this many iterations may be elided.
    pub elide_after_iterations: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_tokens: 64_000,
            compress_at_percent: 80,
            compress_target_percent: 60,
            elide_after_iterations: 3,
        }
    }
}

// ─── ServerConfig ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the gateway.
    pub host: String,
    /// Bind port for the gateway.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8080,
        }
    }
}

// ─── AppConfig ────────────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// Loaded from `~/.alex/config.toml`, falling back to defaults, then
/// overridden by `ALEX_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub provider: ProviderConfig,
    pub agent: AgentConfig,
    pub context: ContextConfig,
    pub sandbox: SandboxConfig,
    pub server: ServerConfig,
    /// Where file/shell tools run; `auto` derives from the process role.
    pub execution_mode: ExecutionModeSetting,
    /// Whether external (MCP) tool registration is attempted at startup.
    pub enable_mcp: bool,
    /// Override for the session directory (default: `~/.alex/sessions`).
    pub session_dir: Option<String>,
    /// Extra system-prompt text prepended to every task, if set.
    pub system_prompt_prefix: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agent: AgentConfig::default(),
            context: ContextConfig::default(),
            sandbox: SandboxConfig::default(),
            server: ServerConfig::default(),
            execution_mode: ExecutionModeSetting::default(),
            enable_mcp: true,
            session_dir: None,
            system_prompt_prefix: None,
        }
    }
}
