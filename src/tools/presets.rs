//! Tool presets: the access-control matrix applied on top of the registry.
//!
//! A preset is a pure predicate from tool name to allow/deny.  The fixed
//! matrix (full / read-only / code-only / web-only / safe) covers the
//! common cases; unknown preset names fail fast at resolve time.

use serde::{Deserialize, Serialize};

/// Logical grouping of tools by capability area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolGroup {
    /// Read-side filesystem tools.
    FsRead,
    /// Write-side filesystem tools.
    FsWrite,
    /// Shell and code execution.
    Exec,
    /// Web/network tools.
    Web,
    /// Sub-agent orchestration.
    Orchestration,
    /// Session-local task tracker (never touches the environment).
    Tracker,
}

impl ToolGroup {
    /// Returns the tools that belong to this group.
    pub fn tools(&self) -> &'static [&'static str] {
        match self {
            ToolGroup::FsRead => &["file_read", "file_stat", "file_list"],
            ToolGroup::FsWrite => &["file_write"],
            ToolGroup::Exec => &["bash", "jupyter_execute"],
            ToolGroup::Web => &["web_search"],
            ToolGroup::Orchestration => &["agent_spawn"],
            ToolGroup::Tracker => &["todo_read", "todo_write"],
        }
    }

    /// Try to determine the group for a tool by name.
    pub fn from_tool_name(name: &str) -> Option<ToolGroup> {
        for group in [
            ToolGroup::FsRead,
            ToolGroup::FsWrite,
            ToolGroup::Exec,
            ToolGroup::Web,
            ToolGroup::Orchestration,
            ToolGroup::Tracker,
        ] {
            if group.tools().contains(&name) {
                return Some(group);
            }
        }
        None
    }
}

/// Predefined tool access presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ToolPreset {
    /// All tools allowed.
    #[default]
    Full,
    /// Inspect-only: filesystem reads, web search, tracker.
    ReadOnly,
    /// Development: filesystem read/write, execution, tracker.
    CodeOnly,
    /// Research: web search and tracker only.
    WebOnly,
    /// Conservative default for untrusted personas: reads, web, tracker;
    /// unknown tools are denied rather than allowed through.
    Safe,
}

impl ToolPreset {
    /// Returns the tool groups allowed by this preset.
    pub fn allowed_groups(&self) -> &'static [ToolGroup] {
        match self {
            ToolPreset::Full => &[
                ToolGroup::FsRead,
                ToolGroup::FsWrite,
                ToolGroup::Exec,
                ToolGroup::Web,
                ToolGroup::Orchestration,
                ToolGroup::Tracker,
            ],
            ToolPreset::ReadOnly => &[ToolGroup::FsRead, ToolGroup::Web, ToolGroup::Tracker],
            ToolPreset::CodeOnly => &[
                ToolGroup::FsRead,
                ToolGroup::FsWrite,
                ToolGroup::Exec,
                ToolGroup::Tracker,
            ],
            ToolPreset::WebOnly => &[ToolGroup::Web, ToolGroup::Tracker],
            ToolPreset::Safe => &[ToolGroup::FsRead, ToolGroup::Web, ToolGroup::Tracker],
        }
    }

    /// Check whether a tool name is allowed by this preset.
    ///
    /// Names outside the known groups (externally registered tools) are
    /// allowed by default, except under `Safe` which denies them.
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        match ToolGroup::from_tool_name(tool_name) {
            Some(group) => self.allowed_groups().contains(&group),
            None => !matches!(self, ToolPreset::Safe),
        }
    }

    /// Returns all available presets.
    pub fn all() -> &'static [ToolPreset] {
        &[
            ToolPreset::Full,
            ToolPreset::ReadOnly,
            ToolPreset::CodeOnly,
            ToolPreset::WebOnly,
            ToolPreset::Safe,
        ]
    }
}

impl std::fmt::Display for ToolPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolPreset::Full => write!(f, "full"),
            ToolPreset::ReadOnly => write!(f, "read-only"),
            ToolPreset::CodeOnly => write!(f, "code-only"),
            ToolPreset::WebOnly => write!(f, "web-only"),
            ToolPreset::Safe => write!(f, "safe"),
        }
    }
}

impl std::str::FromStr for ToolPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" => Ok(ToolPreset::Full),
            "read-only" | "read_only" | "readonly" => Ok(ToolPreset::ReadOnly),
            "code-only" | "code_only" => Ok(ToolPreset::CodeOnly),
            "web-only" | "web_only" => Ok(ToolPreset::WebOnly),
            "safe" => Ok(ToolPreset::Safe),
            _ => Err(format!(
                "unknown tool preset: {s}. Valid options: full, read-only, code-only, web-only, safe"
            )),
        }
    }
}
