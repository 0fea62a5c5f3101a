//! Filesystem tools: `file_read`, `file_write`, `file_stat`, `file_list`.
//!
//! Every tool branches once on the execution mode: the local path touches
//! the host filesystem, the sandbox path serializes the operation to the
//! sandbox's `/file/*` endpoints.  Both branches return results with the
//! same externally visible shape; only backend metadata differs.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AgentResult;

use super::route::{route, Backend};
use super::traits::{required_str, ExecutionContext, Tool, ToolResult};

// ─── FileReadTool ────────────────────────────────────────────────────────────

pub struct FileReadTool;

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file.  Use max_lines to limit output for large files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute path to the file." },
                "max_lines": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (default: all).",
                    "minimum": 1
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let max_lines = args.get("max_lines").and_then(Value::as_u64).map(|n| n as usize);

        let contents = match route(ctx)? {
            Backend::Unavailable(result) => return Ok(result),
            Backend::Local => match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    return Ok(ToolResult::err("", format!("failed to read '{path}': {e}")))
                }
            },
            Backend::Sandbox(client) => match client.file_read(&path).await {
                Ok(c) => c,
                Err(e) => return Ok(ToolResult::err("", e.to_string())),
            },
        };

        let output = match max_lines {
            Some(n) => contents.lines().take(n).collect::<Vec<_>>().join("\n"),
            None => contents,
        };

        Ok(ToolResult::ok("", output).with_metadata(json!({ "path": path })))
    }
}

// ─── FileWriteTool ───────────────────────────────────────────────────────────

pub struct FileWriteTool;

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it if it does not exist and overwriting it if it does."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path":    { "type": "string", "description": "Absolute path to write." },
                "content": { "type": "string", "description": "Content to write." }
            },
            "required": ["path", "content"]
        })
    }

    fn dangerous(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let content = match required_str(&args, "content") {
            Ok(c) => c.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let bytes = content.len() as u64;

        match route(ctx)? {
            Backend::Unavailable(result) => return Ok(result),
            Backend::Local => {
                if let Some(parent) = Path::new(&path).parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return Ok(ToolResult::err(
                            "",
                            format!("failed to create parent dirs: {e}"),
                        ));
                    }
                }
                if let Err(e) = tokio::fs::write(&path, &content).await {
                    return Ok(ToolResult::err("", format!("failed to write '{path}': {e}")));
                }
            }
            Backend::Sandbox(client) => {
                if let Err(e) = client.file_write(&path, &content).await {
                    return Ok(ToolResult::err("", e.to_string()));
                }
            }
        }

        Ok(
            ToolResult::ok("", format!("wrote {bytes} bytes to '{path}'"))
                .with_metadata(json!({ "path": path, "bytes": bytes })),
        )
    }
}

// ─── FileStatTool ────────────────────────────────────────────────────────────

pub struct FileStatTool;

#[async_trait]
impl Tool for FileStatTool {
    fn name(&self) -> &str {
        "file_stat"
    }

    fn description(&self) -> &str {
        "Return metadata (size, kind) for a file or directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute path to inspect." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };

        let (size, is_dir) = match route(ctx)? {
            Backend::Unavailable(result) => return Ok(result),
            Backend::Local => match tokio::fs::metadata(&path).await {
                Ok(meta) => (meta.len(), meta.is_dir()),
                Err(e) => {
                    return Ok(ToolResult::err("", format!("failed to stat '{path}': {e}")))
                }
            },
            Backend::Sandbox(client) => match client.file_stat(&path).await {
                Ok(stat) => (stat.size, stat.is_dir),
                Err(e) => return Ok(ToolResult::err("", e.to_string())),
            },
        };

        let kind = if is_dir { "directory" } else { "file" };
        Ok(
            ToolResult::ok("", format!("{path}: {kind}, {size} bytes"))
                .with_metadata(json!({ "path": path, "size": size, "is_dir": is_dir })),
        )
    }
}

// ─── FileListTool ────────────────────────────────────────────────────────────

pub struct FileListTool;

#[async_trait]
impl Tool for FileListTool {
    fn name(&self) -> &str {
        "file_list"
    }

    fn description(&self) -> &str {
        "List the contents of a directory."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Absolute path of the directory." }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let path = match required_str(&args, "path") {
            Ok(p) => p.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };

        let mut entries = match route(ctx)? {
            Backend::Unavailable(result) => return Ok(result),
            Backend::Local => {
                let mut entries = Vec::new();
                let mut dir = match tokio::fs::read_dir(&path).await {
                    Ok(d) => d,
                    Err(e) => {
                        return Ok(ToolResult::err("", format!("failed to list '{path}': {e}")))
                    }
                };
                while let Ok(Some(entry)) = dir.next_entry().await {
                    entries.push(entry.path().display().to_string());
                }
                entries
            }
            Backend::Sandbox(client) => match client.file_list(&path).await {
                Ok(entries) => entries,
                Err(e) => return Ok(ToolResult::err("", e.to_string())),
            },
        };

        entries.sort();
        let count = entries.len();
        Ok(ToolResult::ok("", entries.join("\n")).with_metadata(json!({ "count": count })))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
