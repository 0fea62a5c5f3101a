//! Execution tools: `bash` and `jupyter_execute`.
//!
//! Local mode spawns a subprocess; sandbox mode serializes the command to
//! the sandbox's `/shell/exec` (or `/jupyter/execute`) endpoint.  Output
//! shape is identical in both modes.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AgentResult;

use super::route::{route, Backend};
use super::traits::{required_str, ExecutionContext, Tool, ToolResult};

/// Hard ceiling on per-command timeouts.
const MAX_TIMEOUT_SECS: u64 = 600;

fn effective_timeout(args: &Value, default: Duration) -> Duration {
    args.get("timeout_seconds")
        .and_then(Value::as_u64)
        .map(|s| Duration::from_secs(s.min(MAX_TIMEOUT_SECS)))
        .unwrap_or(default)
}

fn merge_output(stdout: &str, stderr: &str) -> String {
    if stderr.is_empty() {
        stdout.to_string()
    } else if stdout.is_empty() {
        format!("STDERR: {stderr}")
    } else {
        format!("{stdout}\nSTDERR: {stderr}")
    }
}

// ─── BashTool ────────────────────────────────────────────────────────────────

/// Executes shell commands via `sh -c`.
pub struct BashTool {
    default_timeout: Duration,
}

impl BashTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    async fn run_local(
        &self,
        command: &str,
        working_dir: Option<&str>,
        timeout: Duration,
        ctx: &ExecutionContext,
    ) -> ToolResult {
        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        cmd.kill_on_drop(true);

        let output = tokio::select! {
            result = tokio::time::timeout(timeout, cmd.output()) => result,
            _ = ctx.cancel.cancelled() => {
                return ToolResult::err("", "command cancelled");
            }
        };

        match output {
            Err(_) => ToolResult::err(
                "",
                format!("command timed out after {}s", timeout.as_secs()),
            ),
            Ok(Err(e)) => ToolResult::err("", format!("failed to spawn process: {e}")),
            Ok(Ok(out)) => {
                let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                let merged = merge_output(&stdout, &stderr);
                let meta = json!({ "exit_code": out.status.code() });
                if out.status.success() {
                    ToolResult::ok("", merged).with_metadata(meta)
                } else {
                    ToolResult::err("", merged).with_metadata(meta)
                }
            }
        }
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its stdout/stderr output and exit code."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute."
                },
                "working_dir": {
                    "type": "string",
                    "description": "Optional working directory for the command."
                },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Optional timeout in seconds (default: 30, max: 600).",
                    "minimum": 1,
                    "maximum": 600
                }
            },
            "required": ["command"]
        })
    }

    fn dangerous(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let command = match required_str(&args, "command") {
            Ok(c) => c.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let working_dir = args
            .get("working_dir")
            .and_then(Value::as_str)
            .map(str::to_string);
        let timeout = effective_timeout(&args, self.default_timeout);

        match route(ctx)? {
            Backend::Unavailable(result) => Ok(result),
            Backend::Local => Ok(self
                .run_local(&command, working_dir.as_deref(), timeout, ctx)
                .await),
            Backend::Sandbox(client) => {
                ctx.events.emit(crate::events::WorkflowEvent::ToolProgress {
                    call_id: ctx.call_id.clone(),
                    tool_name: self.name().to_string(),
                    message: "executing in sandbox".to_string(),
                });
                // The sandbox shell has no working-dir parameter; fold it
                // into the command line.
                let full = match &working_dir {
                    Some(dir) => format!("cd {dir} && {command}"),
                    None => command.clone(),
                };
                let exec = tokio::select! {
                    result = client.shell_exec(&full, Some(timeout)) => result,
                    _ = ctx.cancel.cancelled() => {
                        return Ok(ToolResult::err("", "command cancelled"));
                    }
                };
                match exec {
                    Ok(r) => {
                        let merged = merge_output(&r.stdout, &r.stderr);
                        let meta = json!({ "exit_code": r.exit_code });
                        if r.exit_code == 0 {
                            Ok(ToolResult::ok("", merged).with_metadata(meta))
                        } else {
                            Ok(ToolResult::err("", merged).with_metadata(meta))
                        }
                    }
                    Err(e) => Ok(ToolResult::err("", e.to_string())),
                }
            }
        }
    }
}

// ─── JupyterTool ─────────────────────────────────────────────────────────────

/// Executes Python code.  Sandbox mode uses the `/jupyter/execute`
/// endpoint; local mode shells out to `python3`.
pub struct JupyterTool {
    default_timeout: Duration,
}

impl JupyterTool {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }
}

#[async_trait]
impl Tool for JupyterTool {
    fn name(&self) -> &str {
        "jupyter_execute"
    }

    fn description(&self) -> &str {
        "Execute a Python snippet and return its output."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": { "type": "string", "description": "Python code to execute." },
                "timeout_seconds": {
                    "type": "integer",
                    "description": "Optional timeout in seconds (default: 30, max: 600).",
                    "minimum": 1,
                    "maximum": 600
                }
            },
            "required": ["code"]
        })
    }

    fn dangerous(&self) -> bool {
        true
    }

    async fn execute(&self, ctx: &ExecutionContext, args: Value) -> AgentResult<ToolResult> {
        let code = match required_str(&args, "code") {
            Ok(c) => c.to_string(),
            Err(e) => return Ok(ToolResult::err("", e)),
        };
        let timeout = effective_timeout(&args, self.default_timeout);

        match route(ctx)? {
            Backend::Unavailable(result) => Ok(result),
            Backend::Local => {
                let mut cmd = tokio::process::Command::new("python3");
                cmd.arg("-c").arg(&code).kill_on_drop(true);
                let output = tokio::select! {
                    result = tokio::time::timeout(timeout, cmd.output()) => result,
                    _ = ctx.cancel.cancelled() => {
                        return Ok(ToolResult::err("", "execution cancelled"));
                    }
                };
                match output {
                    Err(_) => Ok(ToolResult::err(
                        "",
                        format!("execution timed out after {}s", timeout.as_secs()),
                    )),
                    Ok(Err(e)) => Ok(ToolResult::err("", format!("failed to run python3: {e}"))),
                    Ok(Ok(out)) => {
                        let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
                        let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
                        if out.status.success() {
                            Ok(ToolResult::ok("", merge_output(&stdout, &stderr)))
                        } else {
                            Ok(ToolResult::err("", merge_output(&stdout, &stderr)))
                        }
                    }
                }
            }
            Backend::Sandbox(client) => match client.jupyter_execute(&code, Some(timeout)).await {
                Ok(r) => match r.error {
                    Some(error) => Ok(ToolResult::err("", error)),
                    None => Ok(ToolResult::ok("", r.output)),
                },
                Err(e) => Ok(ToolResult::err("", e.to_string())),
            },
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
