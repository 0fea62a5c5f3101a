//! Pluggable health probes consulted by `/health`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sandbox::SandboxManager;

// ─── Status types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentStatus {
    Ready,
    NotReady,
    Disabled,
}

/// One component's contribution to the aggregate report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: ComponentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ComponentHealth {
    pub fn ready(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::Ready,
            message: None,
            details: None,
        }
    }

    pub fn not_ready(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::NotReady,
            message: Some(message.into()),
            details: None,
        }
    }

    pub fn disabled(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: ComponentStatus::Disabled,
            message: None,
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Aggregated `/health` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// `"healthy"` when no component is `not_ready`, else `"degraded"`.
    pub status: String,
    pub components: Vec<ComponentHealth>,
}

// ─── HealthProbe ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn name(&self) -> &str;
    async fn check(&self) -> ComponentHealth;
}

impl std::fmt::Debug for dyn HealthProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthProbe")
            .field("name", &self.name())
            .finish()
    }
}

/// Probe registry; registration happens in the container's Start phase.
#[derive(Default, Debug)]
pub struct HealthRegistry {
    probes: std::sync::RwLock<Vec<Arc<dyn HealthProbe>>>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, probe: Arc<dyn HealthProbe>) {
        if let Ok(mut probes) = self.probes.write() {
            probes.push(probe);
        }
    }

    pub async fn report(&self) -> HealthReport {
        let probes: Vec<Arc<dyn HealthProbe>> = self
            .probes
            .read()
            .map(|p| p.clone())
            .unwrap_or_default();

        let mut components = Vec::with_capacity(probes.len());
        for probe in probes {
            components.push(probe.check().await);
        }

        let degraded = components
            .iter()
            .any(|c| c.status == ComponentStatus::NotReady);
        HealthReport {
            status: if degraded { "degraded" } else { "healthy" }.to_string(),
            components,
        }
    }
}

// ─── Built-in probes ─────────────────────────────────────────────────────────

/// Probe reflecting the sandbox manager's initialization status.
pub struct SandboxHealthProbe {
    manager: Arc<SandboxManager>,
}

impl SandboxHealthProbe {
    pub fn new(manager: Arc<SandboxManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl HealthProbe for SandboxHealthProbe {
    fn name(&self) -> &str {
        "sandbox"
    }

    async fn check(&self) -> ComponentHealth {
        if self.manager.is_ready() {
            ComponentHealth::ready("sandbox")
        } else {
            let message = self
                .manager
                .last_error()
                .unwrap_or_else(|| "not initialized".to_string());
            ComponentHealth::not_ready("sandbox", message).with_details(serde_json::json!({
                "permanent_failure": self.manager.is_permanently_failed(),
            }))
        }
    }
}

/// Probe with a fixed answer, used for feature-flagged subsystems.
pub struct StaticProbe {
    name: String,
    health: ComponentHealth,
}

impl StaticProbe {
    pub fn new(name: impl Into<String>, health: ComponentHealth) -> Self {
        Self {
            name: name.into(),
            health,
        }
    }
}

#[async_trait]
impl HealthProbe for StaticProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> ComponentHealth {
        self.health.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_is_healthy() {
        let registry = HealthRegistry::new();
        let report = registry.report().await;
        assert_eq!(report.status, "healthy");
        assert!(report.components.is_empty());
    }

    #[tokio::test]
    async fn disabled_components_do_not_degrade() {
        let registry = HealthRegistry::new();
        registry.register(Arc::new(StaticProbe::new(
            "mcp",
            ComponentHealth::disabled("mcp"),
        )));
        registry.register(Arc::new(StaticProbe::new(
            "llm",
            ComponentHealth::ready("llm"),
        )));
        let report = registry.report().await;
        assert_eq!(report.status, "healthy");
        assert_eq!(report.components.len(), 2);
    }

    #[tokio::test]
    async fn not_ready_degrades_aggregate() {
        let registry = HealthRegistry::new();
        registry.register(Arc::new(StaticProbe::new(
            "sandbox",
            ComponentHealth::not_ready("sandbox", "unreachable"),
        )));
        let report = registry.report().await;
        assert_eq!(report.status, "degraded");
        assert_eq!(report.components[0].status, ComponentStatus::NotReady);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ComponentStatus::NotReady).unwrap(),
            "\"not_ready\""
        );
    }
}
