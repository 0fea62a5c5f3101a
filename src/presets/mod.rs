//! Agent and tool preset resolution.
//!
//! Resolution is pure and idempotent: the same preset names always yield
//! the same persona prompt and the same filter decisions.  Unknown names
//! fail before any LLM spend.

use serde::{Deserialize, Serialize};

use crate::errors::{AgentError, AgentResult};
use crate::tools::ToolPreset;

// ─── AgentPreset ─────────────────────────────────────────────────────────────

/// Named persona selecting the base system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AgentPreset {
    #[default]
    Default,
    CodeExpert,
    Researcher,
    Devops,
    SecurityAnalyst,
}

impl AgentPreset {
    /// The persona system prompt for this preset.
    pub fn persona(&self) -> &'static str {
        match self {
            AgentPreset::Default => {
                "You are Alex, a capable AI assistant. Work through the user's task \
                 step by step, using the available tools when they help. When you \
                 have the answer, reply with it directly and stop calling tools."
            }
            AgentPreset::CodeExpert => {
                "You are Alex, an expert software engineer. Read code before \
                 changing it, keep edits minimal and idiomatic, and verify your \
                 work with the available tools. Prefer concrete file references \
                 over speculation."
            }
            AgentPreset::Researcher => {
                "You are Alex, a meticulous research assistant. Gather information \
                 with the available tools, cross-check claims across sources, and \
                 present findings with references. Distinguish facts from \
                 inference."
            }
            AgentPreset::Devops => {
                "You are Alex, a pragmatic DevOps engineer. Inspect systems before \
                 acting, prefer reversible operations, and report the exact \
                 commands you ran together with their output."
            }
            AgentPreset::SecurityAnalyst => {
                "You are Alex, a defensive security analyst. Review code and \
                 configuration for vulnerabilities, explain impact and remediation, \
                 and never exploit findings. Treat every target as production."
            }
        }
    }

    pub fn all() -> &'static [AgentPreset] {
        &[
            AgentPreset::Default,
            AgentPreset::CodeExpert,
            AgentPreset::Researcher,
            AgentPreset::Devops,
            AgentPreset::SecurityAnalyst,
        ]
    }
}

impl std::fmt::Display for AgentPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentPreset::Default => write!(f, "default"),
            AgentPreset::CodeExpert => write!(f, "code-expert"),
            AgentPreset::Researcher => write!(f, "researcher"),
            AgentPreset::Devops => write!(f, "devops"),
            AgentPreset::SecurityAnalyst => write!(f, "security-analyst"),
        }
    }
}

impl std::str::FromStr for AgentPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(AgentPreset::Default),
            "code-expert" | "code_expert" => Ok(AgentPreset::CodeExpert),
            "researcher" => Ok(AgentPreset::Researcher),
            "devops" => Ok(AgentPreset::Devops),
            "security-analyst" | "security_analyst" => Ok(AgentPreset::SecurityAnalyst),
            _ => Err(format!(
                "unknown agent preset: {s}. Valid options: default, code-expert, \
                 researcher, devops, security-analyst"
            )),
        }
    }
}

// ─── PresetConfig / ResolvedPresets ──────────────────────────────────────────

/// Raw preset names from a request; `None` means the default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PresetConfig {
    pub agent_preset: Option<String>,
    pub tool_preset: Option<String>,
}

/// The pure value pair produced by resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPresets {
    pub agent: AgentPreset,
    pub tools: ToolPreset,
}

impl ResolvedPresets {
    pub fn persona(&self) -> &'static str {
        self.agent.persona()
    }
}

/// Resolve raw preset names, failing fast on unknown ones.
pub fn resolve(config: &PresetConfig) -> AgentResult<ResolvedPresets> {
    let agent = match config.agent_preset.as_deref() {
        None | Some("") => AgentPreset::Default,
        Some(name) => name
            .parse::<AgentPreset>()
            .map_err(AgentError::Validation)?,
    };
    let tools = match config.tool_preset.as_deref() {
        None | Some("") => ToolPreset::Full,
        Some(name) => name.parse::<ToolPreset>().map_err(AgentError::Validation)?,
    };
    Ok(ResolvedPresets { agent, tools })
}
