//! Task coordinator: end-to-end ownership of a task from request to
//! persisted session and terminal event.
//!
//! The coordinator is the only caller of the ReAct engine.  Per task it
//! resolves presets (failing before any LLM spend), loads or creates the
//! session, compresses history when warranted, composes the system prompt,
//! selects the LLM client, applies the tool-preset filter, drives the
//! engine, and persists the produced turns plus the event history.
//!
//! Cost records flow through the task state and are merged into the session
//! only at save time; there is no shared mutable cost slot.

pub mod cancel;
pub mod task;

pub use cancel::{CancelCause, CancelSignal, RequestedBy};
pub use task::{TaskHandle, TaskPhase, TaskRequest, TaskStatus};

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use chrono::Utc;
use uuid::Uuid;

use crate::agent::{EngineConfig, ReactEngine, Services, StopReason, TaskResult, TaskState};
use crate::ai::types::Message;
use crate::ai::{LLMProvider, ProviderFactory, StreamingProvider};
use crate::config::AppConfig;
use crate::context::ContextManager;
use crate::errors::{AgentError, AgentResult};
use crate::events::{SessionEventBus, TaskEventEmitter, WorkflowEvent};
use crate::presets::{self, ResolvedPresets};
use crate::sandbox::SandboxManager;
use crate::sessions::{Session, SessionStore, SessionSummary};
use crate::tools::{view_of, ExecutionContext, ExecutionMode, TodoStore, ToolRegistry};

// ─── Task table ──────────────────────────────────────────────────────────────

#[derive(Debug)]
struct TaskEntry {
    status: TaskStatus,
    cancel: CancelSignal,
}

// ─── TaskCoordinator ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct TaskCoordinator {
    config: AppConfig,
    mode: ExecutionMode,
    store: Arc<dyn SessionStore>,
    registry: Arc<ToolRegistry>,
    bus: Arc<SessionEventBus>,
    context: Arc<ContextManager>,
    sandbox: Option<Arc<SandboxManager>>,
    todos: Arc<TodoStore>,
    providers: Arc<dyn ProviderFactory>,
    /// "Environment context" system-prompt segment, published at startup.
    env_prompt: RwLock<Option<String>>,
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl TaskCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        mode: ExecutionMode,
        store: Arc<dyn SessionStore>,
        registry: Arc<ToolRegistry>,
        bus: Arc<SessionEventBus>,
        context: Arc<ContextManager>,
        sandbox: Option<Arc<SandboxManager>>,
        todos: Arc<TodoStore>,
        providers: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            config,
            mode,
            store,
            registry,
            bus,
            context,
            sandbox,
            todos,
            providers,
            env_prompt: RwLock::new(None),
            tasks: RwLock::new(HashMap::new()),
        }
    }

    pub fn bus(&self) -> Arc<SessionEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Install the environment summary injected into new sessions' system
    /// prompts.  Called once from the container's Start phase.
    pub fn set_environment_prompt(&self, summary: String) {
        if let Ok(mut slot) = self.env_prompt.write() {
            *slot = Some(summary);
        }
    }

    // ── Public API ───────────────────────────────────────────────────────────

    /// Execute a task to completion on the caller's flow.
    #[tracing::instrument(name = "coordinator.execute", skip_all, fields(session = ?request.session_id))]
    pub async fn execute_task(&self, request: TaskRequest) -> AgentResult<TaskResult> {
        let prepared = self.prepare(request).await?;
        self.run_prepared(prepared).await
    }

    /// Schedule a background execution and return its identifiers.
    pub async fn execute_task_async(self: &Arc<Self>, request: TaskRequest) -> AgentResult<TaskHandle> {
        let prepared = self.prepare(request).await?;
        let handle = TaskHandle {
            task_id: prepared.task_id.clone(),
            session_id: prepared.session.id.clone(),
            run_id: prepared.run_id.clone(),
        };
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = prepared.task_id.clone();
            if let Err(e) = coordinator.run_prepared(prepared).await {
                log::error!("background task {task_id} failed: {e}");
            }
        });
        Ok(handle)
    }

    /// Schedule a background execution, subscribing to its event stream
    /// before the first event can fire.  Used by interactive clients.
    pub async fn execute_task_watch(
        self: &Arc<Self>,
        request: TaskRequest,
    ) -> AgentResult<(
        TaskHandle,
        tokio::sync::broadcast::Receiver<crate::events::EventEnvelope>,
    )> {
        let prepared = self.prepare(request).await?;
        let handle = TaskHandle {
            task_id: prepared.task_id.clone(),
            session_id: prepared.session.id.clone(),
            run_id: prepared.run_id.clone(),
        };
        let events_session = prepared
            .request
            .events_session
            .clone()
            .unwrap_or_else(|| prepared.session.id.clone());
        let receiver = self.bus.subscribe(&events_session);
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = prepared.task_id.clone();
            if let Err(e) = coordinator.run_prepared(prepared).await {
                log::error!("background task {task_id} failed: {e}");
            }
        });
        Ok((handle, receiver))
    }

    /// Cancel a running task.  Idempotent; returns `false` for unknown ids.
    pub fn cancel_task(&self, task_id: &str, reason: &str, requested_by: RequestedBy) -> bool {
        let tasks = match self.tasks.read() {
            Ok(tasks) => tasks,
            Err(_) => return false,
        };
        match tasks.get(task_id) {
            Some(entry) => {
                entry.cancel.cancel(reason, requested_by);
                true
            }
            None => false,
        }
    }

    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks
            .read()
            .ok()
            .and_then(|tasks| tasks.get(task_id).map(|e| e.status.clone()))
    }

    // ── Session pass-throughs ────────────────────────────────────────────────

    pub async fn list_sessions(&self) -> AgentResult<Vec<SessionSummary>> {
        self.store.list().await
    }

    pub async fn get_session(&self, id: &str) -> AgentResult<Session> {
        self.store.load(id).await
    }

    pub async fn delete_session(&self, id: &str) -> AgentResult<()> {
        self.store.delete(id).await?;
        self.bus.remove_session(id);
        Ok(())
    }

    /// Fork a session: same history and todos under a fresh id, with fresh
    /// cost and event history.
    pub async fn fork_session(&self, id: &str) -> AgentResult<Session> {
        let source = self.store.load(id).await?;
        let mut fork = Session::with_fresh_id();
        fork.messages = source.messages.clone();
        fork.todos = source.todos.clone();
        fork.label = source
            .label
            .clone()
            .map(|label| format!("{label} (fork)"));
        self.store.save(&fork).await?;
        Ok(fork)
    }

    // ── Orchestration ────────────────────────────────────────────────────────

    async fn prepare(&self, request: TaskRequest) -> AgentResult<PreparedTask> {
        if request.task.trim().is_empty() {
            return Err(AgentError::Validation("task must not be empty".to_string()));
        }

        // Fail on unknown presets before any LLM spend.
        let resolved = presets::resolve(&request.presets)?;

        let session = match &request.session_id {
            Some(id) => self.store.load(id).await?,
            None => {
                let mut session = Session::with_fresh_id();
                session.label = Some(clip(&request.task, 60));
                self.store.save(&session).await?;
                session
            }
        };

        let task_id = Uuid::new_v4().to_string();
        let run_id = Uuid::new_v4().to_string();
        let cancel = CancelSignal::new();
        let now = Utc::now();
        let status = TaskStatus {
            task_id: task_id.clone(),
            run_id: run_id.clone(),
            session_id: session.id.clone(),
            status: TaskPhase::Pending,
            error: None,
            agent_preset: resolved.agent.to_string(),
            tool_preset: resolved.tools.to_string(),
            created_at: now,
            updated_at: now,
        };
        if let Ok(mut tasks) = self.tasks.write() {
            tasks.insert(
                task_id.clone(),
                TaskEntry {
                    status,
                    cancel: cancel.clone(),
                },
            );
        }

        Ok(PreparedTask {
            request,
            resolved,
            session,
            task_id,
            run_id,
            cancel,
        })
    }

    async fn run_prepared(&self, prepared: PreparedTask) -> AgentResult<TaskResult> {
        let PreparedTask {
            request,
            resolved,
            mut session,
            task_id,
            run_id,
            cancel,
        } = prepared;

        self.update_status(&task_id, TaskPhase::Running, None);

        let events_session = request
            .events_session
            .clone()
            .unwrap_or_else(|| session.id.clone());
        let emitter = TaskEventEmitter::new(
            Arc::clone(&self.bus),
            events_session,
            task_id.clone(),
            run_id.clone(),
            request.agent_level,
        );

        emitter.emit(WorkflowEvent::InputReceived {
            task: request.task.clone(),
        });
        // The session's standing todo list is the task's plan.
        if !session.todos.is_empty() {
            emitter.emit(WorkflowEvent::PlanCreated {
                steps: session.todos.iter().map(|t| t.title.clone()).collect(),
            });
        }

        // Hydrate the todo tracker from the session record.
        self.todos.set(&session.id, session.todos.clone());

        let provider = match self.providers.create(request.llm_selection.as_deref()) {
            Ok(provider) => provider,
            Err(e) => {
                self.update_status(&task_id, TaskPhase::Failed, Some(e.to_string()));
                return Err(e);
            }
        };
        let provider_name = provider.provider_name().to_string();
        let model = provider.model_id().to_string();
        let llm: Arc<dyn LLMProvider> = if request.stream {
            Arc::new(StreamingProvider::new(provider, emitter.clone()))
        } else {
            provider
        };

        // Prompt view: composed system prompt + (possibly compressed)
        // history + this task's user turn.  The system prompt is composed
        // fresh per task and never persisted in the session.
        let mut history = session.messages.clone();
        if self.context.should_compress(&history) {
            history = self.context.compress(&history);
        }
        let mut prompt = Vec::with_capacity(history.len() + 2);
        prompt.push(Message::system(self.compose_system_prompt(&resolved)));
        prompt.extend(history);

        let mut state = TaskState::new(prompt, &provider_name);
        state.push_turn(Message::user(request.task.clone()));

        let engine = ReactEngine::new(EngineConfig {
            model,
            max_iterations: self.config.agent.max_iterations,
            temperature: self.config.agent.temperature,
            max_tokens: self.config.agent.max_tokens,
        });
        let services = Services {
            llm,
            tools: view_of(&self.registry, resolved.tools),
            context: Arc::clone(&self.context),
            events: emitter.clone(),
        };
        let ctx = ExecutionContext {
            mode: self.mode,
            sandbox: self.sandbox.clone(),
            cancel: cancel.clone(),
            session_id: session.id.clone(),
            task_id: task_id.clone(),
            call_id: String::new(),
            agent_level: request.agent_level,
            events: emitter.clone(),
        };

        let result = match engine.run(&mut state, &services, &ctx).await {
            Ok(result) => result,
            Err(e) => {
                // Internal engine failure: persist what was produced, then
                // surface the error.
                self.persist(&mut session, &state, &emitter).await;
                self.update_status(&task_id, TaskPhase::Failed, Some(e.to_string()));
                return Err(e);
            }
        };

        // Terminal event, emitted after every per-iteration event.
        match result.stop_reason {
            StopReason::Cancelled => {
                let cause = cancel.cause().unwrap_or(CancelCause {
                    reason: "cancelled".to_string(),
                    requested_by: RequestedBy::System,
                });
                emitter.emit(WorkflowEvent::ResultCancelled {
                    reason: cause.reason,
                    requested_by: cause.requested_by.to_string(),
                });
                self.update_status(&task_id, TaskPhase::Cancelled, result.error.clone());
            }
            StopReason::ToolFatal | StopReason::LlmFatal => {
                emitter.emit(WorkflowEvent::ResultFinal {
                    final_answer: String::new(),
                    total_iterations: result.iterations,
                    total_tokens: result.tokens_used,
                    stream_finished: true,
                    attachments: Default::default(),
                });
                self.update_status(&task_id, TaskPhase::Failed, result.error.clone());
            }
            StopReason::FinalAnswer | StopReason::MaxIterations => {
                emitter.emit(WorkflowEvent::ResultFinal {
                    final_answer: result.final_answer.clone(),
                    total_iterations: result.iterations,
                    total_tokens: result.tokens_used,
                    stream_finished: true,
                    attachments: Default::default(),
                });
                self.update_status(&task_id, TaskPhase::Completed, None);
            }
        }

        self.persist(&mut session, &state, &emitter).await;
        self.todos.clear(&session.id);
        Ok(result)
    }

    /// Append the task's produced turns, merge its cost, sync todos, record
    /// events, and save.  Persistence happens for fatal and cancelled
    /// outcomes too.
    async fn persist(&self, session: &mut Session, state: &TaskState, emitter: &TaskEventEmitter) {
        session.append_messages(state.new_messages().to_vec());
        session.cost.merge(&state.cost);
        session.todos = self.todos.get(&session.id);
        for envelope in emitter.recorded() {
            session.push_event(envelope);
        }
        if let Err(e) = self.store.save(session).await {
            log::error!("failed to save session {}: {e}", session.id);
        }
    }

    fn compose_system_prompt(&self, resolved: &ResolvedPresets) -> String {
        let mut prompt = String::new();
        if let Some(prefix) = &self.config.system_prompt_prefix {
            prompt.push_str(prefix);
            prompt.push_str("\n\n");
        }
        prompt.push_str(resolved.persona());
        if let Ok(env) = self.env_prompt.read() {
            if let Some(summary) = env.as_ref() {
                prompt.push_str("\n\n");
                prompt.push_str(summary);
            }
        }
        prompt
    }

    fn update_status(&self, task_id: &str, phase: TaskPhase, error: Option<String>) {
        if let Ok(mut tasks) = self.tasks.write() {
            if let Some(entry) = tasks.get_mut(task_id) {
                entry.status.status = phase;
                entry.status.error = error;
                entry.status.updated_at = Utc::now();
            }
        }
    }
}

struct PreparedTask {
    request: TaskRequest,
    resolved: ResolvedPresets,
    session: Session,
    task_id: String,
    run_id: String,
    cancel: CancelSignal,
}

fn clip(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}

// ─── Tests ───────────────────────────────────────────────────────────────────
