//! Tool trait, results, and the execution-mode routing context.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ai::types::ToolSchema;
use crate::coordinator::CancelSignal;
use crate::errors::{AgentError, AgentResult};
use crate::events::{AgentLevel, SessionEventBus, TaskEventEmitter};
use crate::sandbox::SandboxManager;

// ─── ExecutionMode ───────────────────────────────────────────────────────────

/// Backend for file/shell-touching tools.
///
/// `Unknown` is a startup-only sentinel: any dispatch still carrying it is a
/// programmer error and fails loudly as an internal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Unknown,
    /// Perform the operation in the host process.
    Local,
    /// Route the operation to the remote sandbox HTTP service.
    Sandbox,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Unknown => write!(f, "unknown"),
            ExecutionMode::Local => write!(f, "local"),
            ExecutionMode::Sandbox => write!(f, "sandbox"),
        }
    }
}

// ─── ToolResult ──────────────────────────────────────────────────────────────

/// The observation produced by executing a [`Tool`].
///
/// Exactly one of {success content, error} is meaningful: `success=false`
/// implies `error` is populated, `success=true` implies `content` is defined.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    /// Id of the tool call this result observes.
    pub call_id: String,
    /// Human-readable output (stdout, file contents, listing, …).
    pub content: String,
    /// Whether the tool considered the execution successful.
    pub success: bool,
    /// Error descriptor when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Optional structured metadata for machine consumption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Optional attachments keyed by id.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, String>,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            success: true,
            error: None,
            metadata: None,
            attachments: BTreeMap::new(),
        }
    }

    pub fn err(call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: String::new(),
            success: false,
            error: Some(error.into()),
            metadata: None,
            attachments: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_attachment(mut self, id: impl Into<String>, body: impl Into<String>) -> Self {
        self.attachments.insert(id.into(), body.into());
        self
    }

    /// Rewrite the call id (the dispatcher stamps the id of the observed
    /// call after execution).
    pub fn for_call(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = call_id.into();
        self
    }

    /// Textual form fed back to the LLM as the observation body.
    pub fn render_for_llm(&self) -> String {
        if self.success {
            self.content.clone()
        } else {
            format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("unspecified tool failure")
            )
        }
    }
}

// ─── ExecutionContext ────────────────────────────────────────────────────────

/// Per-task context handed to every tool execution.
///
/// Carries the routing mode, the sandbox handle (when wired), the task's
/// cancel signal, and identity for event tagging.
#[derive(Clone)]
pub struct ExecutionContext {
    pub mode: ExecutionMode,
    pub sandbox: Option<Arc<SandboxManager>>,
    pub cancel: CancelSignal,
    pub session_id: String,
    pub task_id: String,
    /// Id of the tool call being executed; stamped by the dispatcher.
    pub call_id: String,
    pub agent_level: AgentLevel,
    /// The task's event emitter, for tools that report progress or
    /// sub-agent boundaries.
    pub events: TaskEventEmitter,
}

impl ExecutionContext {
    /// A local-mode context for tests and simple embedding.
    pub fn local(session_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let task_id = task_id.into();
        let events = TaskEventEmitter::new(
            Arc::new(SessionEventBus::new()),
            session_id.clone(),
            task_id.clone(),
            "local",
            AgentLevel::Core,
        );
        Self {
            mode: ExecutionMode::Local,
            sandbox: None,
            cancel: CancelSignal::new(),
            session_id,
            task_id,
            call_id: String::new(),
            agent_level: AgentLevel::Core,
            events,
        }
    }

    /// Per-call derivation stamping the call id.
    pub fn for_call(&self, call_id: impl Into<String>) -> Self {
        let mut ctx = self.clone();
        ctx.call_id = call_id.into();
        ctx
    }

    /// Fail loudly if the mode is still the startup sentinel.
    pub fn require_known_mode(&self) -> AgentResult<ExecutionMode> {
        match self.mode {
            ExecutionMode::Unknown => Err(AgentError::Internal(
                "tool dispatched with execution mode 'unknown'".to_string(),
            )),
            mode => Ok(mode),
        }
    }

    /// The sandbox manager, required when the mode routes remotely.
    pub fn sandbox(&self) -> AgentResult<&Arc<SandboxManager>> {
        self.sandbox.as_ref().ok_or_else(|| {
            AgentError::Internal("sandbox mode configured without a sandbox manager".to_string())
        })
    }
}

// ─── Tool ────────────────────────────────────────────────────────────────────

/// A named, schema-described capability the LLM may invoke.
///
/// Implementations are stateless (modulo shared handles), registered once,
/// and safe for concurrent execution.  `execute` returns `Err` only for
/// fatal conditions the engine cannot observe past; ordinary failures are
/// expressed as a [`ToolResult`] with `error` populated.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Stable machine identifier (snake_case), e.g. `"file_read"`.
    fn name(&self) -> &str;

    /// Human-readable description shown to the LLM.
    fn description(&self) -> &str;

    /// JSON Schema object describing the accepted parameters.
    fn parameters_schema(&self) -> Value;

    /// Whether the interactive CLI should confirm before running this tool.
    fn dangerous(&self) -> bool {
        false
    }

    /// Execute the tool.  Both execution modes must return results with the
    /// same externally visible shape.
    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult>;
}

impl std::fmt::Debug for dyn Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool").field("name", &self.name()).finish()
    }
}

/// Build the LLM-facing schema for a registered tool.
pub fn schema_of(tool: &dyn Tool) -> ToolSchema {
    ToolSchema {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
        dangerous: tool.dangerous(),
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Extract a required string argument.
pub fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("missing required argument '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_invariant_holds() {
        let ok = ToolResult::ok("c1", "output");
        assert!(ok.success);
        assert!(ok.error.is_none());

        let err = ToolResult::err("c1", "boom");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("boom"));
        assert!(err.content.is_empty());
    }

    #[test]
    fn render_for_llm_prefers_error() {
        assert_eq!(ToolResult::ok("c", "hi").render_for_llm(), "hi");
        assert_eq!(
            ToolResult::err("c", "nope").render_for_llm(),
            "Error: nope"
        );
    }

    #[test]
    fn unknown_mode_fails_loudly() {
        let mut ctx = ExecutionContext::local("s", "t");
        ctx.mode = ExecutionMode::Unknown;
        let err = ctx.require_known_mode().unwrap_err();
        assert!(matches!(err, AgentError::Internal(_)));
    }

    #[test]
    fn required_str_errors_on_missing() {
        let args = serde_json::json!({"path": "/a"});
        assert_eq!(required_str(&args, "path").unwrap(), "/a");
        assert!(required_str(&args, "content").is_err());
    }
}
