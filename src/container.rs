//! Two-phase dependency container.
//!
//! **Build** is pure, in-memory wiring: factories, tool registration, mode
//! resolution, coordinator construction.  No I/O, no background tasks —
//! tests can build a container without API keys or a reachable sandbox.
//!
//! **Start** initiates the optional heavy pieces: sandbox initialization
//! (inline probe, then background retry on failure), health-probe
//! registration, and the environment-snapshot capture whose summary is
//! injected into every task's system prompt.
//!
//! **Shutdown** is idempotent.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, RwLock,
};
use std::time::Duration;

use crate::ai::{EnvProviderFactory, ProviderFactory};
use crate::config::{loader, AppConfig, ExecutionModeSetting};
use crate::context::ContextManager;
use crate::coordinator::TaskCoordinator;
use crate::diagnostics::{
    ComponentHealth, EnvironmentSnapshot, HealthRegistry, SandboxHealthProbe, StaticProbe,
};
use crate::errors::{AgentError, AgentResult};
use crate::events::{EventEnvelope, SessionEventBus};
use crate::sandbox::{SandboxManager, DIAGNOSTIC_SESSION};
use crate::sessions::{FsSessionStore, SessionStore};
use crate::tools::{
    register_default_tools, AgentSpawnTool, ExecutionMode, TodoStore, ToolRegistry,
};

// ─── ProcessRole ─────────────────────────────────────────────────────────────

/// Which front-end this process serves; `auto` execution mode derives the
/// backend from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// Interactive CLI: one task at a time, local execution.
    Cli,
    /// HTTP gateway: concurrent tasks, sandboxed execution.
    Server,
}

fn resolve_mode(setting: ExecutionModeSetting, role: ProcessRole) -> ExecutionMode {
    match setting {
        ExecutionModeSetting::Local => ExecutionMode::Local,
        ExecutionModeSetting::Sandbox => ExecutionMode::Sandbox,
        ExecutionModeSetting::Auto => match role {
            ProcessRole::Cli => ExecutionMode::Local,
            ProcessRole::Server => ExecutionMode::Sandbox,
        },
    }
}

// ─── AppContainer ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct AppContainer {
    config: AppConfig,
    mode: ExecutionMode,
    bus: Arc<SessionEventBus>,
    coordinator: Arc<TaskCoordinator>,
    sandbox: Option<Arc<SandboxManager>>,
    health: Arc<HealthRegistry>,
    snapshot: RwLock<Option<EnvironmentSnapshot>>,
    started: AtomicBool,
    shut_down: AtomicBool,
}

impl AppContainer {
    /// Build with the default session store and provider factory.
    pub fn build(config: AppConfig, role: ProcessRole) -> AgentResult<Self> {
        let store: Arc<dyn SessionStore> = match &config.session_dir {
            Some(dir) => Arc::new(FsSessionStore::new(dir.clone())),
            None => Arc::new(FsSessionStore::new(
                FsSessionStore::default_dir().map_err(AgentError::Configuration)?,
            )),
        };
        let providers = Arc::new(EnvProviderFactory::new(config.provider.clone()));
        Self::build_with(config, role, store, providers)
    }

    /// Build with injected store and provider factory (for tests and
    /// embedding).  Pure: performs no I/O.
    pub fn build_with(
        config: AppConfig,
        role: ProcessRole,
        store: Arc<dyn SessionStore>,
        providers: Arc<dyn ProviderFactory>,
    ) -> AgentResult<Self> {
        let mode = resolve_mode(config.execution_mode, role);
        let bus = Arc::new(SessionEventBus::new());

        let sandbox = match mode {
            ExecutionMode::Sandbox => {
                let url = loader::validate_sandbox_url(&config)
                    .map_err(AgentError::Configuration)?;
                Some(Arc::new(
                    SandboxManager::new(url.as_str(), &config.sandbox, Some(Arc::clone(&bus)))
                        .map_err(AgentError::Configuration)?,
                ))
            }
            ExecutionMode::Local => None,
            ExecutionMode::Unknown => {
                return Err(AgentError::Internal(
                    "execution mode unresolved at container build".to_string(),
                ))
            }
        };

        let todos = Arc::new(TodoStore::new());
        let spawn_tool = Arc::new(AgentSpawnTool::new());
        let mut registry = ToolRegistry::new();
        register_default_tools(
            &mut registry,
            &todos,
            Arc::clone(&spawn_tool),
            Duration::from_secs(config.sandbox.op_timeout_secs),
        )?;

        let context = Arc::new(ContextManager::new(config.context.clone()));
        let coordinator = Arc::new(TaskCoordinator::new(
            config.clone(),
            mode,
            store,
            Arc::new(registry),
            Arc::clone(&bus),
            context,
            sandbox.clone(),
            todos,
            providers,
        ));
        spawn_tool.attach(&coordinator);

        Ok(Self {
            config,
            mode,
            bus,
            coordinator,
            sandbox,
            health: Arc::new(HealthRegistry::new()),
            snapshot: RwLock::new(None),
            started: AtomicBool::new(false),
            shut_down: AtomicBool::new(false),
        })
    }

    // ── Start ────────────────────────────────────────────────────────────────

    /// Start phase: sandbox probe (with background retry on failure),
    /// health probes, environment snapshot.  One-shot.
    pub async fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        match &self.sandbox {
            Some(manager) => {
                self.health
                    .register(Arc::new(SandboxHealthProbe::new(Arc::clone(manager))));
                if let Err(e) = manager.initialize().await {
                    log::warn!("sandbox initialization failed, retrying in background: {e}");
                    tokio::spawn(Arc::clone(manager).background_reinit());
                }
            }
            None => {
                self.health.register(Arc::new(StaticProbe::new(
                    "sandbox",
                    ComponentHealth::disabled("sandbox"),
                )));
            }
        }

        // MCP registration is delegated to an external registrar; the flag
        // only surfaces the probe.
        let mcp_health = if self.config.enable_mcp {
            let mut health = ComponentHealth::disabled("mcp");
            health.message = Some("no MCP registrar configured".to_string());
            health
        } else {
            ComponentHealth::disabled("mcp")
        };
        self.health
            .register(Arc::new(StaticProbe::new("mcp", mcp_health)));

        // Environment snapshot: captured once, published, and injected into
        // every subsequent task's system prompt.
        let snapshot = EnvironmentSnapshot::capture(self.sandbox.as_deref()).await;
        self.bus.publish(EventEnvelope::new(
            DIAGNOSTIC_SESSION,
            snapshot.to_event(),
        ));
        self.coordinator
            .set_environment_prompt(snapshot.summary());
        if let Ok(mut slot) = self.snapshot.write() {
            *slot = Some(snapshot);
        }

        log::info!(
            "container started (mode={}, mcp={})",
            self.mode,
            self.config.enable_mcp
        );
    }

    // ── Shutdown ─────────────────────────────────────────────────────────────

    /// Idempotent shutdown.  Background tasks observe their cancel signals;
    /// nothing here blocks.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("container shutting down");
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn coordinator(&self) -> Arc<TaskCoordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn bus(&self) -> Arc<SessionEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn health(&self) -> Arc<HealthRegistry> {
        Arc::clone(&self.health)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn sandbox(&self) -> Option<Arc<SandboxManager>> {
        self.sandbox.clone()
    }

    pub fn environment_snapshot(&self) -> Option<EnvironmentSnapshot> {
        self.snapshot.read().ok().and_then(|s| s.clone())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::provider::{
        LLMProvider, ProviderError, Result as ProviderResult, StreamResponse,
    };
    use crate::ai::types::{CompletionRequest, CompletionResponse};
    use crate::sessions::InMemorySessionStore;
    use async_trait::async_trait;

    struct NullProvider;

    #[async_trait]
    impl LLMProvider for NullProvider {
        async fn complete(&self, _: CompletionRequest) -> ProviderResult<CompletionResponse> {
            Ok(CompletionResponse {
                content: "ok".into(),
                tool_calls: vec![],
                model: "null".into(),
                usage: None,
                finish_reason: None,
            })
        }
        async fn stream(&self, _: CompletionRequest) -> ProviderResult<StreamResponse> {
            Err(ProviderError::Transport("no stream".to_string()))
        }
        fn context_limit(&self) -> usize {
            1024
        }
        fn model_id(&self) -> &str {
            "null"
        }
        fn provider_name(&self) -> &str {
            "null"
        }
    }

    struct NullFactory;

    impl ProviderFactory for NullFactory {
        fn create(&self, _: Option<&str>) -> AgentResult<Arc<dyn LLMProvider>> {
            Ok(Arc::new(NullProvider))
        }
    }

    fn build(config: AppConfig, role: ProcessRole) -> AgentResult<AppContainer> {
        AppContainer::build_with(
            config,
            role,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(NullFactory),
        )
    }

    #[test]
    fn cli_role_resolves_local_mode() {
        let container = build(AppConfig::default(), ProcessRole::Cli).unwrap();
        assert_eq!(container.mode(), ExecutionMode::Local);
        assert!(container.sandbox().is_none());
    }

    #[test]
    fn server_role_without_sandbox_url_fails_build() {
        let err = build(AppConfig::default(), ProcessRole::Server).unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn server_role_with_url_resolves_sandbox_mode() {
        let mut config = AppConfig::default();
        config.sandbox.base_url = Some("http://127.0.0.1:1".to_string());
        let container = build(config, ProcessRole::Server).unwrap();
        assert_eq!(container.mode(), ExecutionMode::Sandbox);
        assert!(container.sandbox().is_some());
    }

    #[test]
    fn explicit_mode_overrides_role() {
        let mut config = AppConfig::default();
        config.execution_mode = ExecutionModeSetting::Local;
        let container = build(config, ProcessRole::Server).unwrap();
        assert_eq!(container.mode(), ExecutionMode::Local);
    }

    #[tokio::test]
    async fn start_without_sandbox_reports_disabled_probe() {
        let container = build(AppConfig::default(), ProcessRole::Cli).unwrap();
        container.start().await;
        let report = container.health().report().await;
        assert_eq!(report.status, "healthy");
        let sandbox = report
            .components
            .iter()
            .find(|c| c.name == "sandbox")
            .unwrap();
        assert_eq!(
            sandbox.status,
            crate::diagnostics::ComponentStatus::Disabled
        );
    }

    #[tokio::test]
    async fn start_publishes_environment_snapshot() {
        let container = build(AppConfig::default(), ProcessRole::Cli).unwrap();
        let mut rx = container.bus().subscribe(DIAGNOSTIC_SESSION);
        container.start().await;

        let envelope = rx.recv().await.unwrap();
        assert_eq!(
            envelope.event.kind(),
            "workflow.diagnostic.environment_snapshot"
        );
        assert!(container.environment_snapshot().is_some());
    }

    #[tokio::test]
    async fn start_and_shutdown_are_idempotent() {
        let container = build(AppConfig::default(), ProcessRole::Cli).unwrap();
        container.start().await;
        container.start().await;
        container.shutdown().await;
        container.shutdown().await;
        // Double start registers probes once.
        let report = container.health().report().await;
        let sandbox_probes = report
            .components
            .iter()
            .filter(|c| c.name == "sandbox")
            .count();
        assert_eq!(sandbox_probes, 1);
    }
}
