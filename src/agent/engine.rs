//! The ReAct engine: the bounded Think/Act/Observe control loop.
//!
//! ```text
//! ┌─► Think    LLM.complete(messages + tool schemas)
//! │     │        no tool calls → final answer, stop
//! │     ▼
//! │   Act      execute all tool calls of the iteration in parallel
//! │     │        (results joined in call-issue order)
//! │     ▼
//! │   Observe  append one tool-role message per call
//! │     │        max iterations → stop; compression if warranted
//! └─────┘
//! ```
//!
//! The engine drives one task using only the injected [`Services`] bundle.
//! It recovers from every non-fatal tool failure, never recovers from
//! LLM-fatal or tool-fatal conditions, and surfaces cancellation at the
//! next safe boundary (before Think, during Think, during the tool join).

use std::sync::Arc;

use uuid::Uuid;

use crate::ai::provider::LLMProvider;
use crate::ai::types::{CompletionRequest, Message, ToolCall};
use crate::context::ContextManager;
use crate::errors::{AgentError, AgentResult};
use crate::events::{TaskEventEmitter, WorkflowEvent};
use crate::tools::{ExecutionContext, RegistryView, ToolResult};

use super::state::{StopReason, TaskResult, TaskState};
use super::tool_parser::{parse_tool_calls, strip_tool_markup};

/// Cap on argument/result previews carried in events.
const PREVIEW_LEN: usize = 200;

// ─── EngineConfig / Services ─────────────────────────────────────────────────

/// Engine construction parameters; fixed for the engine's lifetime.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Model identifier submitted with every completion.
    pub model: String,
    /// Maximum Think/Act/Observe iterations (≥ 1).
    pub max_iterations: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl EngineConfig {
    pub fn new(model: impl Into<String>, max_iterations: usize) -> Self {
        Self {
            model: model.into(),
            max_iterations: max_iterations.max(1),
            temperature: None,
            max_tokens: None,
        }
    }
}

/// The capability bundle injected per task.  The registry view already
/// reflects the task's tool preset.
pub struct Services {
    pub llm: Arc<dyn LLMProvider>,
    pub tools: RegistryView,
    pub context: Arc<ContextManager>,
    pub events: TaskEventEmitter,
}

// ─── ReactEngine ─────────────────────────────────────────────────────────────

pub struct ReactEngine {
    config: EngineConfig,
}

impl ReactEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config: EngineConfig {
                max_iterations: config.max_iterations.max(1),
                ..config
            },
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drive one task to completion.
    ///
    /// `state.messages` is session history ending with a user turn.  On
    /// return the final assistant message is present in `state.messages` and
    /// equals `result.final_answer`; `result.iterations` never exceeds the
    /// configured bound.  Fatal conditions are reported through the result's
    /// stop reason with partial messages retained in `state`.
    #[tracing::instrument(
        name = "engine.run",
        skip_all,
        fields(
            model = %self.config.model,
            max_iterations = self.config.max_iterations,
            history_len = state.messages.len(),
        )
    )]
    pub async fn run(
        &self,
        state: &mut TaskState,
        services: &Services,
        ctx: &ExecutionContext,
    ) -> AgentResult<TaskResult> {
        loop {
            // ── Boundary: cancellation check ─────────────────────────────────
            if ctx.cancel.is_cancelled() {
                return Ok(self.finish(state, StopReason::Cancelled, cancel_reason(ctx)));
            }

            let iteration = state.iterations + 1;
            services.events.emit(WorkflowEvent::NodeStarted {
                iteration,
                total: self.config.max_iterations,
                description: "think".to_string(),
            });

            // ── Think ────────────────────────────────────────────────────────
            let mut request =
                CompletionRequest::new(self.config.model.clone(), state.messages.clone())
                    .with_tools(services.tools.schemas());
            if let Some(t) = self.config.temperature {
                request = request.with_temperature(t);
            }
            if let Some(m) = self.config.max_tokens {
                request = request.with_max_tokens(m);
            }

            let completion = tokio::select! {
                result = services.llm.complete(request) => result,
                _ = ctx.cancel.cancelled() => {
                    return Ok(self.finish(state, StopReason::Cancelled, cancel_reason(ctx)));
                }
            };

            let response = match completion {
                Ok(response) => response,
                Err(e) => {
                    // The adapter already spent its retry budget; whatever
                    // reaches this point is final.
                    let message = e.to_string();
                    services.events.emit(WorkflowEvent::NodeFailed {
                        iteration,
                        error: message.clone(),
                    });
                    state.done = true;
                    return Ok(self.finish(state, StopReason::LlmFatal, Some(message)));
                }
            };

            state.iterations = iteration;
            if let Some(usage) = response.usage {
                state
                    .cost
                    .record(usage.prompt_tokens as u64, usage.completion_tokens as u64);
            }

            // Native tool calls win; otherwise extract textual ones.
            let mut content = response.content.clone();
            let mut calls: Vec<ToolCall> = response.tool_calls.clone();
            if calls.is_empty() {
                let parsed = parse_tool_calls(&content);
                if !parsed.is_empty() {
                    calls = parsed
                        .into_iter()
                        .map(|p| {
                            let id = p
                                .call_id
                                .unwrap_or_else(|| format!("call-{}", Uuid::new_v4()));
                            ToolCall::new(id, p.name, p.arguments)
                        })
                        .collect();
                    content = strip_tool_markup(&response.content);
                }
            }

            state.push_turn(Message::assistant_with_calls(content.clone(), calls.clone()));

            // ── Terminate-early check ────────────────────────────────────────
            if calls.is_empty() {
                // Empty content with no calls is a degenerate final answer;
                // terminating avoids an infinite loop.
                state.done = true;
                state.final_answer = content.clone();
                services.events.emit(WorkflowEvent::NodeOutputSummary {
                    iteration,
                    summary: content,
                });
                services.events.emit(WorkflowEvent::NodeCompleted {
                    iteration,
                    total: self.config.max_iterations,
                    status: "final_answer".to_string(),
                });
                return Ok(self.finish(state, StopReason::FinalAnswer, None));
            }

            // ── Act ──────────────────────────────────────────────────────────
            for call in &calls {
                services.events.emit(WorkflowEvent::ToolStarted {
                    call_id: call.id.clone(),
                    tool_name: call.name.clone(),
                    arguments_preview: preview(&call.arguments.to_string()),
                });
            }

            let executions = calls
                .iter()
                .map(|call| self.execute_call(call, services, ctx));
            let outcomes = tokio::select! {
                outcomes = futures::future::join_all(executions) => outcomes,
                _ = ctx.cancel.cancelled() => {
                    return Ok(self.finish(state, StopReason::Cancelled, cancel_reason(ctx)));
                }
            };

            // ── Observe (call-issue order) ───────────────────────────────────
            let mut fatal: Option<AgentError> = None;
            for (call, outcome) in calls.iter().zip(outcomes) {
                let result = match outcome {
                    Ok(result) => result,
                    Err(e) => {
                        // Keep the call/result sets matched even on the way
                        // out of a fatal failure.
                        let observed = ToolResult::err(call.id.clone(), e.to_string());
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                        observed
                    }
                };
                services.events.emit(WorkflowEvent::ToolCompleted {
                    call_id: result.call_id.clone(),
                    tool_name: call.name.clone(),
                    success: result.success,
                    result_preview: preview(&result.render_for_llm()),
                    error: result.error.clone(),
                    attachments: result.attachments.clone(),
                });
                state.push_turn(Message::tool_observation(result));
            }

            if let Some(e) = fatal {
                services.events.emit(WorkflowEvent::NodeFailed {
                    iteration,
                    error: e.to_string(),
                });
                state.done = true;
                return Ok(self.finish(state, StopReason::ToolFatal, Some(e.to_string())));
            }

            if !content.is_empty() {
                services.events.emit(WorkflowEvent::NodeOutputSummary {
                    iteration,
                    summary: content,
                });
            }
            services.events.emit(WorkflowEvent::NodeCompleted {
                iteration,
                total: self.config.max_iterations,
                status: "ok".to_string(),
            });

            // ── Iteration bound ──────────────────────────────────────────────
            if state.iterations >= self.config.max_iterations {
                state.done = true;
                state.final_answer = state.last_assistant_content();
                return Ok(self.finish(state, StopReason::MaxIterations, None));
            }

            // ── Compression ──────────────────────────────────────────────────
            if services.context.should_compress(&state.messages) {
                let before = state.messages.len();
                state.messages = services.context.compress(&state.messages);
                log::debug!(
                    "compressed history {before} → {} messages",
                    state.messages.len()
                );
            }
            state.token_estimate = services.context.estimate_tokens(&state.messages);
        }
    }

    /// Execute one tool call.  Lookup failures (unknown or denied tools) are
    /// non-fatal observations; `Err` is reserved for fatal conditions.
    #[tracing::instrument(name = "engine.tool", skip_all, fields(tool = %call.name, call_id = %call.id))]
    async fn execute_call(
        &self,
        call: &ToolCall,
        services: &Services,
        ctx: &ExecutionContext,
    ) -> AgentResult<ToolResult> {
        let tool = match services.tools.get(&call.name) {
            Ok(tool) => tool,
            Err(lookup) => return Ok(ToolResult::err(call.id.clone(), lookup.to_string())),
        };

        let call_ctx = ctx.for_call(call.id.clone());
        match tool.execute(&call_ctx, call.arguments.clone()).await {
            Ok(result) => Ok(result.for_call(call.id.clone())),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => Ok(ToolResult::err(call.id.clone(), e.to_string())),
        }
    }

    fn finish(
        &self,
        state: &mut TaskState,
        stop_reason: StopReason,
        error: Option<String>,
    ) -> TaskResult {
        if stop_reason == StopReason::Cancelled {
            state.done = true;
        }
        TaskResult {
            final_answer: state.final_answer.clone(),
            messages: state.messages.clone(),
            iterations: state.iterations,
            tokens_used: state.cost.total_tokens,
            stop_reason,
            error,
        }
    }
}

fn cancel_reason(ctx: &ExecutionContext) -> Option<String> {
    ctx.cancel.cause().map(|c| c.reason)
}

fn preview(text: &str) -> String {
    if text.len() <= PREVIEW_LEN {
        return text.to_string();
    }
    let mut end = PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

// ─── Tests ───────────────────────────────────────────────────────────────────
