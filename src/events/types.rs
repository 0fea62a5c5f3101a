//! Typed progress events streamed to CLI and SSE subscribers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── AgentLevel ──────────────────────────────────────────────────────────────

/// Whether an event was produced by the top-level task or a sub-agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentLevel {
    #[default]
    Core,
    Sub,
}

// ─── WorkflowEvent ───────────────────────────────────────────────────────────

/// All events that flow through the per-session event stream.
///
/// The serialized form carries the kind under `event_type`, matching the
/// names clients subscribe to over SSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum WorkflowEvent {
    #[serde(rename = "workflow.input.received")]
    InputReceived { task: String },

    #[serde(rename = "workflow.plan.created")]
    PlanCreated { steps: Vec<String> },

    /// Iteration boundary: one Think/Act/Observe pass started.
    #[serde(rename = "workflow.node.started")]
    NodeStarted {
        iteration: usize,
        total: usize,
        description: String,
    },

    #[serde(rename = "workflow.node.completed")]
    NodeCompleted {
        iteration: usize,
        total: usize,
        status: String,
    },

    #[serde(rename = "workflow.node.failed")]
    NodeFailed { iteration: usize, error: String },

    /// Incremental assistant output.
    #[serde(rename = "workflow.node.output.delta")]
    NodeOutputDelta { delta: String },

    /// Finalized per-iteration assistant output.
    #[serde(rename = "workflow.node.output.summary")]
    NodeOutputSummary { iteration: usize, summary: String },

    #[serde(rename = "workflow.tool.started")]
    ToolStarted {
        call_id: String,
        tool_name: String,
        arguments_preview: String,
    },

    #[serde(rename = "workflow.tool.progress")]
    ToolProgress {
        call_id: String,
        tool_name: String,
        message: String,
    },

    #[serde(rename = "workflow.tool.completed")]
    ToolCompleted {
        call_id: String,
        tool_name: String,
        success: bool,
        result_preview: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attachments: BTreeMap<String, String>,
    },

    #[serde(rename = "workflow.subflow.progress")]
    SubflowProgress { subtask_id: String, message: String },

    #[serde(rename = "workflow.subflow.completed")]
    SubflowCompleted { subtask_id: String, success: bool },

    #[serde(rename = "workflow.result.final")]
    ResultFinal {
        final_answer: String,
        total_iterations: usize,
        total_tokens: u64,
        stream_finished: bool,
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        attachments: BTreeMap<String, String>,
    },

    #[serde(rename = "workflow.result.cancelled")]
    ResultCancelled {
        reason: String,
        /// `"user"` or `"system"`.
        requested_by: String,
    },

    #[serde(rename = "workflow.diagnostic.environment_snapshot")]
    EnvironmentSnapshot {
        host: BTreeMap<String, String>,
        sandbox: BTreeMap<String, String>,
        captured_at: DateTime<Utc>,
    },

    #[serde(rename = "workflow.diagnostic.sandbox_progress")]
    SandboxProgress {
        /// `"running"`, `"ok"` or `"error"`.
        status: String,
        stage: String,
        step: usize,
        total_steps: usize,
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl WorkflowEvent {
    /// The `event_type` string for this event, as used on the SSE wire.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::InputReceived { .. } => "workflow.input.received",
            WorkflowEvent::PlanCreated { .. } => "workflow.plan.created",
            WorkflowEvent::NodeStarted { .. } => "workflow.node.started",
            WorkflowEvent::NodeCompleted { .. } => "workflow.node.completed",
            WorkflowEvent::NodeFailed { .. } => "workflow.node.failed",
            WorkflowEvent::NodeOutputDelta { .. } => "workflow.node.output.delta",
            WorkflowEvent::NodeOutputSummary { .. } => "workflow.node.output.summary",
            WorkflowEvent::ToolStarted { .. } => "workflow.tool.started",
            WorkflowEvent::ToolProgress { .. } => "workflow.tool.progress",
            WorkflowEvent::ToolCompleted { .. } => "workflow.tool.completed",
            WorkflowEvent::SubflowProgress { .. } => "workflow.subflow.progress",
            WorkflowEvent::SubflowCompleted { .. } => "workflow.subflow.completed",
            WorkflowEvent::ResultFinal { .. } => "workflow.result.final",
            WorkflowEvent::ResultCancelled { .. } => "workflow.result.cancelled",
            WorkflowEvent::EnvironmentSnapshot { .. } => {
                "workflow.diagnostic.environment_snapshot"
            }
            WorkflowEvent::SandboxProgress { .. } => "workflow.diagnostic.sandbox_progress",
        }
    }

    /// True for terminal `workflow.result.*` events.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::ResultFinal { .. } | WorkflowEvent::ResultCancelled { .. }
        )
    }
}

// ─── EventEnvelope ───────────────────────────────────────────────────────────

/// A published event with its routing and ordering metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(flatten)]
    pub event: WorkflowEvent,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default)]
    pub agent_level: AgentLevel,
}

impl EventEnvelope {
    pub fn new(session_id: impl Into<String>, event: WorkflowEvent) -> Self {
        Self {
            event,
            timestamp: Utc::now(),
            session_id: session_id.into(),
            task_id: None,
            run_id: None,
            agent_level: AgentLevel::Core,
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.run_id = Some(run_id.into());
        self
    }

    pub fn with_level(mut self, level: AgentLevel) -> Self {
        self.agent_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_tag_on_wire() {
        let env = EventEnvelope::new(
            "s1",
            WorkflowEvent::InputReceived {
                task: "read README".into(),
            },
        );
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event_type"], "workflow.input.received");
        assert_eq!(json["session_id"], "s1");
        assert_eq!(json["agent_level"], "core");
    }

    #[test]
    fn kind_matches_serialized_tag() {
        let events = vec![
            WorkflowEvent::PlanCreated { steps: vec![] },
            WorkflowEvent::NodeStarted {
                iteration: 1,
                total: 3,
                description: "think".into(),
            },
            WorkflowEvent::ResultFinal {
                final_answer: "done".into(),
                total_iterations: 1,
                total_tokens: 0,
                stream_finished: true,
                attachments: BTreeMap::new(),
            },
        ];
        for event in events {
            let kind = event.kind();
            let json = serde_json::to_value(&event).unwrap();
            assert_eq!(json["event_type"], kind);
        }
    }

    #[test]
    fn terminal_classification() {
        assert!(WorkflowEvent::ResultFinal {
            final_answer: String::new(),
            total_iterations: 0,
            total_tokens: 0,
            stream_finished: false,
            attachments: BTreeMap::new(),
        }
        .is_terminal());
        assert!(WorkflowEvent::ResultCancelled {
            reason: "user_requested".into(),
            requested_by: "user".into(),
        }
        .is_terminal());
        assert!(!WorkflowEvent::PlanCreated { steps: vec![] }.is_terminal());
    }
}
