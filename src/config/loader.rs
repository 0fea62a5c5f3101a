//! TOML configuration loading and env-var overrides.
//!
//! # Loading order
//! 1. Parse `~/.alex/config.toml` (or the path in `ALEX_CONFIG`)
//! 2. Apply `ALEX_*` environment variable overrides
//! 3. Fall back to [`AppConfig::default()`] if the file is missing

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use super::schema::{AppConfig, ExecutionModeSetting};

// ─── default_config_path ─────────────────────────────────────────────────────

/// Return the default config file path: `~/.alex/config.toml`.
pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::home_dir()
        .map(|h| h.join(".alex").join("config.toml"))
        .ok_or_else(|| "could not determine home directory".to_string())
}

// ─── load_config ─────────────────────────────────────────────────────────────

/// Load [`AppConfig`] from the given path, falling back to defaults if the
/// file does not exist, then applying environment variable overrides.
pub fn load_config(path: &Path) -> Result<AppConfig, String> {
    let mut config = match fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)
            .map_err(|e| format!("failed to parse config at {path:?}: {e}"))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => return Err(format!("failed to read config at {path:?}: {e}")),
    };

    apply_env_overrides(&mut config);
    Ok(config)
}

/// Load config from the default path (or `ALEX_CONFIG`), applying env
/// overrides.  Parse failures fall back to defaults.
pub fn load_default_config() -> AppConfig {
    let path = env::var("ALEX_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            default_config_path().unwrap_or_else(|_| PathBuf::from("config.toml"))
        });

    load_config(&path).unwrap_or_default()
}

// ─── apply_env_overrides ─────────────────────────────────────────────────────

/// Apply `ALEX_*` environment variable overrides to `config`.
///
/// Supported overrides:
/// - `ALEX_SANDBOX_BASE_URL` → `sandbox.base_url`
/// - `ALEX_EXECUTION_MODE`   → `execution_mode` (auto|local|sandbox)
/// - `ALEX_ENABLE_MCP`       → `enable_mcp` (1/0/true/false)
/// - `ALEX_PROVIDER_ID`      → `provider.default_id`
/// - `ALEX_PROVIDER_MODEL`   → `provider.default_model`
/// - `ALEX_MAX_ITERATIONS`   → `agent.max_iterations`
fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(v) = env::var("ALEX_SANDBOX_BASE_URL") {
        config.sandbox.base_url = Some(v);
    }
    if let Ok(v) = env::var("ALEX_EXECUTION_MODE") {
        match v.parse::<ExecutionModeSetting>() {
            Ok(mode) => config.execution_mode = mode,
            Err(e) => log::warn!("ignoring ALEX_EXECUTION_MODE: {e}"),
        }
    }
    if let Ok(v) = env::var("ALEX_ENABLE_MCP") {
        config.enable_mcp = v == "1" || v.eq_ignore_ascii_case("true");
    }
    if let Ok(v) = env::var("ALEX_PROVIDER_ID") {
        config.provider.default_id = v;
    }
    if let Ok(v) = env::var("ALEX_PROVIDER_MODEL") {
        config.provider.default_model = v;
    }
    if let Ok(v) = env::var("ALEX_MAX_ITERATIONS") {
        if let Ok(n) = v.parse::<usize>() {
            config.agent.max_iterations = n.max(1);
        }
    }
}

// ─── validate_sandbox_url ────────────────────────────────────────────────────

/// Validate the configured sandbox base URL.  Required (and checked) when
/// the resolved execution mode is `sandbox`.
pub fn validate_sandbox_url(config: &AppConfig) -> Result<url::Url, String> {
    let raw = config
        .sandbox
        .base_url
        .as_deref()
        .ok_or("sandbox mode requires ALEX_SANDBOX_BASE_URL or [sandbox].base_url")?;
    url::Url::parse(raw).map_err(|e| format!("invalid sandbox base URL '{raw}': {e}"))
}

// ─── Tests ───────────────────────────────────────────────────────────────────
