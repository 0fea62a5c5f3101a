//! Health probes and environment diagnostics.

pub mod environment;
pub mod health;

pub use environment::{capture_host_env, environment_summary, EnvironmentSnapshot};
pub use health::{
    ComponentHealth, ComponentStatus, HealthProbe, HealthRegistry, HealthReport,
    SandboxHealthProbe, StaticProbe,
};
