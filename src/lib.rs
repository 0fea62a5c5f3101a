//! # Alex — AI coding-agent runtime
//!
//! Alex accepts natural-language tasks, drives an LLM through a
//! Reason-Act-Observe loop, dispatches tool invocations on the agent's
//! behalf, streams fine-grained progress events to interactive clients,
//! and persists conversational sessions for resumption.
//!
//! Two front-ends consume the runtime: an interactive CLI (`alex`, one
//! task at a time with stdout streaming) and an HTTP gateway
//! (`alex-server`, concurrent tasks with SSE streaming and a cancellation
//! API).
//!
//! ## Architecture
//!
//! ```text
//! client → TaskCoordinator::execute_task(task, session?, presets)
//!    → SessionStore::load → ContextManager (compress if warranted)
//!    → presets::resolve(agent, tools) → system prompt ⊕ environment
//!    → ReactEngine::run(state, services)
//!        loop: LLMProvider::complete → RegistryView dispatch
//!              (local | sandbox backend) → SessionEventBus per event
//!    → SessionStore::save → TaskResult
//! ```
//!
//! The [`container::AppContainer`] wires everything in two phases: a pure
//! Build (no I/O, testable offline) and a Start that initiates sandbox
//! probing, health probes and the environment snapshot.

pub mod agent;
pub mod ai;
pub mod config;
pub mod container;
pub mod context;
pub mod coordinator;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod logging;
pub mod presets;
pub mod sandbox;
pub mod sessions;
pub mod tools;

#[cfg(feature = "server")]
pub mod gateway;

pub use container::{AppContainer, ProcessRole};
pub use coordinator::{TaskCoordinator, TaskRequest};
pub use errors::{AgentError, AgentResult};
