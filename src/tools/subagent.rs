//! Sub-agent orchestration as a tool.
//!
//! `agent_spawn` invokes the coordinator recursively: the child task runs
//! in its own fresh session while its events are published under the parent
//! session with `agent_level=sub`, so UIs can separate the streams.  The
//! engine stays unaware of the recursion.

use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::coordinator::{TaskCoordinator, TaskRequest};
use crate::errors::AgentResult;
use crate::events::{AgentLevel, WorkflowEvent};
use crate::presets::PresetConfig;

use super::traits::{required_str, ExecutionContext, Tool, ToolResult};

pub struct AgentSpawnTool {
    /// Weak back-reference, wired after the coordinator exists (the
    /// coordinator owns the registry this tool lives in).
    coordinator: OnceLock<Weak<TaskCoordinator>>,
}

impl AgentSpawnTool {
    pub fn new() -> Self {
        Self {
            coordinator: OnceLock::new(),
        }
    }

    /// Wire the coordinator.  Called once during container build.
    pub fn attach(&self, coordinator: &Arc<TaskCoordinator>) {
        let _ = self.coordinator.set(Arc::downgrade(coordinator));
    }

    fn coordinator(&self) -> Option<Arc<TaskCoordinator>> {
        self.coordinator.get().and_then(Weak::upgrade)
    }
}

impl Default for AgentSpawnTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for AgentSpawnTool {
    fn name(&self) -> &str {
        "agent_spawn"
    }

    fn description(&self) -> &str {
        "Delegate a self-contained subtask to a sub-agent and return its \
         final answer.  Useful for parallelizable decomposition."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "task": { "type": "string", "description": "The subtask to delegate." },
                "agent_preset": {
                    "type": "string",
                    "description": "Optional persona for the sub-agent."
                },
                "tool_preset": {
                    "type": "string",
                    "description": "Optional tool access preset for the sub-agent."
                }
            },
            "required": ["task"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let task = match required_str(&args, "task") {
            Ok(t) => t.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let Some(coordinator) = self.coordinator() else {
            return Ok(ToolResult::err("", "sub-agent orchestration is not available"));
        };

        let subtask_id = uuid::Uuid::new_v4().to_string();
        ctx.events.emit_with_level(
            WorkflowEvent::SubflowProgress {
                subtask_id: subtask_id.clone(),
                message: format!("spawning sub-agent: {}", task),
            },
            AgentLevel::Sub,
        );

        let request = TaskRequest {
            task,
            session_id: None,
            presets: PresetConfig {
                agent_preset: args
                    .get("agent_preset")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                tool_preset: args
                    .get("tool_preset")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            llm_selection: None,
            stream: false,
            agent_level: AgentLevel::Sub,
            events_session: Some(ctx.session_id.clone()),
        };

        let outcome = coordinator.execute_task(request).await;
        let (result, success) = match outcome {
            Ok(result) => {
                let success = !result.stop_reason.is_fatal();
                let observed = if success {
                    ToolResult::ok("", result.final_answer.clone()).with_metadata(json!({
                        "iterations": result.iterations,
                        "stop_reason": result.stop_reason.to_string(),
                    }))
                } else {
                    ToolResult::err(
                        "",
                        result
                            .error
                            .unwrap_or_else(|| "sub-agent failed".to_string()),
                    )
                };
                (observed, success)
            }
            Err(e) => (ToolResult::err("", e.to_string()), false),
        };

        ctx.events.emit_with_level(
            WorkflowEvent::SubflowCompleted {
                subtask_id,
                success,
            },
            AgentLevel::Sub,
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unwired_tool_is_nonfatal() {
        let tool = AgentSpawnTool::new();
        let ctx = ExecutionContext::local("s", "t");
        let r = tool.execute(&ctx, json!({"task": "sub"})).await.unwrap();
        assert!(!r.success);
        assert!(r.error.as_deref().unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn missing_task_is_nonfatal() {
        let tool = AgentSpawnTool::new();
        let ctx = ExecutionContext::local("s", "t");
        let r = tool.execute(&ctx, json!({})).await.unwrap();
        assert!(!r.success);
    }
}
