//! Agent-managed task tracker: `todo_read` and `todo_write`.
//!
//! Todos live in a session-keyed in-memory store during execution; the
//! coordinator hydrates the store from the session record at task start and
//! persists it back at save time.

use std::{collections::HashMap, sync::Arc, sync::RwLock};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AgentResult;
use crate::sessions::TodoItem;

use super::traits::{ExecutionContext, Tool, ToolResult};

// ─── TodoStore ───────────────────────────────────────────────────────────────

/// Session-keyed todo lists shared by the two tracker tools.
#[derive(Default)]
#[derive(Debug)]
pub struct TodoStore {
    lists: RwLock<HashMap<String, Vec<TodoItem>>>,
}

impl TodoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, session_id: &str) -> Vec<TodoItem> {
        self.lists
            .read()
            .ok()
            .and_then(|m| m.get(session_id).cloned())
            .unwrap_or_default()
    }

    pub fn set(&self, session_id: &str, todos: Vec<TodoItem>) {
        if let Ok(mut map) = self.lists.write() {
            map.insert(session_id.to_string(), todos);
        }
    }

    pub fn clear(&self, session_id: &str) {
        if let Ok(mut map) = self.lists.write() {
            map.remove(session_id);
        }
    }
}

fn render_todos(todos: &[TodoItem]) -> String {
    if todos.is_empty() {
        return "No todos.".to_string();
    }
    todos
        .iter()
        .map(|t| {
            let mark = match t.status.as_str() {
                "done" => "x",
                "in_progress" => "~",
                _ => " ",
            };
            format!("- [{mark}] {}", t.title)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

// ─── TodoReadTool ────────────────────────────────────────────────────────────

pub struct TodoReadTool {
    store: Arc<TodoStore>,
}

impl TodoReadTool {
    pub fn new(store: Arc<TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoReadTool {
    fn name(&self) -> &str {
        "todo_read"
    }

    fn description(&self) -> &str {
        "Read the current todo list for this session."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, ctx: &ExecutionContext, _args: Value) -> AgentResult<ToolResult> {
        let todos = self.store.get(&ctx.session_id);
        let count = todos.len();
        Ok(ToolResult::ok("", render_todos(&todos)).with_metadata(json!({ "count": count })))
    }
}

// ─── TodoWriteTool ───────────────────────────────────────────────────────────

/// Replaces the session's todo list wholesale; items keep their ids when
/// the title matches an existing entry.
pub struct TodoWriteTool {
    store: Arc<TodoStore>,
}

impl TodoWriteTool {
    pub fn new(store: Arc<TodoStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for TodoWriteTool {
    fn name(&self) -> &str {
        "todo_write"
    }

    fn description(&self) -> &str {
        "Replace the session todo list.  Each item has a title and a status \
         of pending, in_progress or done."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "todos": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title":  { "type": "string" },
                            "status": {
                                "type": "string",
                                "enum": ["pending", "in_progress", "done"]
                            }
                        },
                        "required": ["title"]
                    }
                }
            },
            "required": ["todos"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let Some(items) = args.get("todos").and_then(Value::as_array) else {
            return Ok(ToolResult::err("", "missing required argument 'todos'"));
        };

        let existing = self.store.get(&ctx.session_id);
        let mut todos = Vec::with_capacity(items.len());
        for item in items {
            let Some(title) = item.get("title").and_then(Value::as_str) else {
                return Ok(ToolResult::err("", "every todo needs a 'title'"));
            };
            let status = item
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("pending");
            if !matches!(status, "pending" | "in_progress" | "done") {
                return Ok(ToolResult::err("", format!("invalid todo status '{status}'")));
            }
            let id = existing
                .iter()
                .find(|t| t.title == title)
                .map(|t| t.id.clone());
            let mut todo = TodoItem::new(title, status);
            if let Some(id) = id {
                todo.id = id;
            }
            todos.push(todo);
        }

        let count = todos.len();
        self.store.set(&ctx.session_id, todos.clone());
        Ok(ToolResult::ok("", render_todos(&todos)).with_metadata(json!({ "count": count })))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
