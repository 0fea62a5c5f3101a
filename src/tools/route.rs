//! Single routing point for dual-mode tools.
//!
//! Tools call [`route`] once per execution: it enforces the mode invariant,
//! gates on sandbox availability, and hands back either the local backend
//! marker or the sandbox wire client.

use crate::errors::{AgentError, AgentResult};
use crate::sandbox::{SandboxAvailability, SandboxHttpClient};

use super::traits::{ExecutionContext, ExecutionMode, ToolResult};

/// Resolved backend for one tool execution.
pub enum Backend<'a> {
    /// Perform the operation in the host process.
    Local,
    /// Route through the sandbox wire client.
    Sandbox(&'a SandboxHttpClient),
    /// The sandbox is not reachable right now; observe this result instead.
    Unavailable(ToolResult),
}

/// Resolve the backend for this execution.
///
/// Mode `Unknown` is an internal error; a permanently failed sandbox is a
/// fatal error; a temporarily unreachable sandbox yields a non-fatal
/// observation.
pub fn route(ctx: &ExecutionContext) -> AgentResult<Backend<'_>> {
    match ctx.require_known_mode()? {
        ExecutionMode::Local => Ok(Backend::Local),
        ExecutionMode::Sandbox => {
            let manager = ctx.sandbox()?;
            match manager.availability() {
                SandboxAvailability::PermanentFailure => Err(AgentError::ToolFatal(
                    "sandbox permanently unreachable".to_string(),
                )),
                SandboxAvailability::Unreachable => {
                    Ok(Backend::Unavailable(ToolResult::err("", "Sandbox unreachable")))
                }
                SandboxAvailability::Ready => Ok(Backend::Sandbox(manager.client())),
            }
        }
        ExecutionMode::Unknown => Err(AgentError::Internal(
            "tool dispatched with execution mode 'unknown'".to_string(),
        )),
    }
}
