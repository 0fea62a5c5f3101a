//! Typed, ordered, per-session progress events.

pub mod bus;
pub mod emitter;
pub mod types;

pub use bus::SessionEventBus;
pub use emitter::TaskEventEmitter;
pub use types::{AgentLevel, EventEnvelope, WorkflowEvent};
