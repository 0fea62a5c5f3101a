//! Tools: the trait, the registry with filtered views, presets, and the
//! built-in tool set.

pub mod file_ops;
pub mod presets;
pub mod registry;
pub mod route;
pub mod shell;
pub mod subagent;
pub mod todo;
pub mod traits;
pub mod web;

pub use presets::{ToolGroup, ToolPreset};
pub use registry::{view_of, LookupError, RegistryView, ToolRegistry};
pub use subagent::AgentSpawnTool;
pub use todo::TodoStore;
pub use traits::{
    required_str, schema_of, ExecutionContext, ExecutionMode, Tool, ToolResult,
};

use std::sync::Arc;
use std::time::Duration;

use crate::errors::AgentResult;

/// Register the built-in tool set.
///
/// `web_search` joins only when `TAVILY_API_KEY` is set; the sub-agent tool
/// is passed in unattached and wired to the coordinator afterwards.
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    todos: &Arc<TodoStore>,
    spawn: Arc<AgentSpawnTool>,
    op_timeout: Duration,
) -> AgentResult<()> {
    registry.register(Arc::new(file_ops::FileReadTool))?;
    registry.register(Arc::new(file_ops::FileWriteTool))?;
    registry.register(Arc::new(file_ops::FileStatTool))?;
    registry.register(Arc::new(file_ops::FileListTool))?;
    registry.register(Arc::new(shell::BashTool::new(op_timeout)))?;
    registry.register(Arc::new(shell::JupyterTool::new(op_timeout)))?;
    registry.register(Arc::new(todo::TodoReadTool::new(Arc::clone(todos))))?;
    registry.register(Arc::new(todo::TodoWriteTool::new(Arc::clone(todos))))?;
    registry.register(spawn)?;

    if let Ok(key) = std::env::var("TAVILY_API_KEY") {
        if !key.is_empty() {
            registry.register(Arc::new(web::WebSearchTool::new(key)))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registration_covers_core_tools() {
        let mut registry = ToolRegistry::new();
        let todos = Arc::new(TodoStore::new());
        register_default_tools(
            &mut registry,
            &todos,
            Arc::new(AgentSpawnTool::new()),
            Duration::from_secs(30),
        )
        .unwrap();

        for name in [
            "file_read",
            "file_write",
            "file_stat",
            "file_list",
            "bash",
            "jupyter_execute",
            "todo_read",
            "todo_write",
            "agent_spawn",
        ] {
            assert!(registry.get(name).is_ok(), "{name} missing");
        }
    }

    #[test]
    fn registration_is_single_shot() {
        let mut registry = ToolRegistry::new();
        let todos = Arc::new(TodoStore::new());
        register_default_tools(
            &mut registry,
            &todos,
            Arc::new(AgentSpawnTool::new()),
            Duration::from_secs(30),
        )
        .unwrap();
        let err = register_default_tools(
            &mut registry,
            &todos,
            Arc::new(AgentSpawnTool::new()),
            Duration::from_secs(30),
        );
        assert!(err.is_err());
    }
}
