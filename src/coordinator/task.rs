//! Task requests, handles and status records for the coordinator's task
//! table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::AgentLevel;
use crate::presets::PresetConfig;

// ─── TaskRequest ─────────────────────────────────────────────────────────────

/// One `execute_task` invocation.
#[derive(Debug, Clone, Default)]
pub struct TaskRequest {
    /// Natural-language task text.
    pub task: String,
    /// Existing session to append to; `None` creates a fresh session.
    pub session_id: Option<String>,
    pub presets: PresetConfig,
    /// Per-request provider override (`"provider"` or `"provider:model"`).
    pub llm_selection: Option<String>,
    /// Attach the streaming decorator so assistant deltas reach the bus.
    pub stream: bool,
    /// `Sub` when this task was spawned by another task's tool call.
    pub agent_level: AgentLevel,
    /// Session whose event stream carries this task's events.  Sub-agents
    /// publish under their parent's session; `None` uses the task's own.
    pub events_session: Option<String>,
}

impl TaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_presets(mut self, presets: PresetConfig) -> Self {
        self.presets = presets;
        self
    }

    pub fn with_llm_selection(mut self, selection: impl Into<String>) -> Self {
        self.llm_selection = Some(selection.into());
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

// ─── TaskPhase / TaskStatus ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskPhase::Pending => write!(f, "pending"),
            TaskPhase::Running => write!(f, "running"),
            TaskPhase::Completed => write!(f, "completed"),
            TaskPhase::Failed => write!(f, "failed"),
            TaskPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Row in the coordinator's in-memory task table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub run_id: String,
    pub session_id: String,
    pub status: TaskPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub agent_preset: String,
    pub tool_preset: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identifiers returned by `execute_task_async`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskHandle {
    pub task_id: String,
    pub session_id: String,
    pub run_id: String,
}
