//! Shared test plumbing: a scripted LLM provider and a coordinator wired
//! with the default tool set, local execution and an in-memory store.
#![allow(dead_code)] // each test binary uses a different subset

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use alex::ai::provider::{LLMProvider, ProviderError, Result as ProviderResult, StreamResponse};
use alex::ai::types::{CompletionRequest, CompletionResponse, TokenUsage};
use alex::ai::ProviderFactory;
use alex::config::{AppConfig, ContextConfig};
use alex::context::ContextManager;
use alex::coordinator::TaskCoordinator;
use alex::errors::AgentResult;
use alex::events::SessionEventBus;
use alex::sessions::InMemorySessionStore;
use alex::tools::{
    register_default_tools, AgentSpawnTool, ExecutionMode, TodoStore, ToolRegistry,
};

pub struct ScriptedProvider {
    responses: Vec<String>,
    index: Arc<AtomicUsize>,
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, _request: CompletionRequest) -> ProviderResult<CompletionResponse> {
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        Ok(CompletionResponse {
            content: self
                .responses
                .get(i)
                .cloned()
                .unwrap_or_else(|| "out of script".to_string()),
            tool_calls: vec![],
            model: "scripted".to_string(),
            usage: Some(TokenUsage {
                prompt_tokens: 20,
                completion_tokens: 10,
                total_tokens: 30,
            }),
            finish_reason: Some("stop".to_string()),
        })
    }

    async fn stream(&self, _request: CompletionRequest) -> ProviderResult<StreamResponse> {
        Err(ProviderError::Transport(
            "scripted provider has no stream".to_string(),
        ))
    }

    fn context_limit(&self) -> usize {
        128_000
    }

    fn model_id(&self) -> &str {
        "scripted"
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

/// Hands out providers that share one script cursor, so consecutive tasks
/// (and recursively spawned sub-agents) consume the response list in order.
pub struct ScriptedFactory {
    pub responses: Vec<String>,
    index: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses,
            index: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, _selection: Option<&str>) -> AgentResult<Arc<dyn LLMProvider>> {
        Ok(Arc::new(ScriptedProvider {
            responses: self.responses.clone(),
            index: Arc::clone(&self.index),
        }))
    }
}

/// Coordinator with the built-in tool set, local mode, in-memory sessions
/// and a scripted LLM.
pub fn coordinator(responses: Vec<String>, max_iterations: usize) -> Arc<TaskCoordinator> {
    let mut config = AppConfig::default();
    config.agent.max_iterations = max_iterations;

    let todos = Arc::new(TodoStore::new());
    let spawn = Arc::new(AgentSpawnTool::new());
    let mut registry = ToolRegistry::new();
    register_default_tools(&mut registry, &todos, Arc::clone(&spawn), Duration::from_secs(30))
        .expect("tool registration");

    let coordinator = Arc::new(TaskCoordinator::new(
        config,
        ExecutionMode::Local,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(registry),
        Arc::new(SessionEventBus::new()),
        Arc::new(ContextManager::new(ContextConfig::default())),
        None,
        todos,
        Arc::new(ScriptedFactory::new(responses)),
    ));
    spawn.attach(&coordinator);
    coordinator
}

/// Shorthand for an XML tool-call response body.
pub fn tool_call(name: &str, arguments: serde_json::Value) -> String {
    format!(
        r#"<tool_call>{{"name": "{name}", "arguments": {arguments}}}</tool_call>"#
    )
}
