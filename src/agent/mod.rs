//! The ReAct engine and its task state.

pub mod engine;
pub mod state;
pub mod tool_parser;

pub use engine::{EngineConfig, ReactEngine, Services};
pub use state::{StopReason, TaskResult, TaskState};
pub use tool_parser::{parse_tool_calls, strip_tool_markup, ParsedToolCall};
