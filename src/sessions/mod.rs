//! Session records and persistence.

pub mod store;
pub mod types;

pub use store::{FsSessionStore, InMemorySessionStore, SessionStore};
pub use types::{
    CostAccumulator, ProviderCost, Session, SessionSummary, TaskCost, TodoItem,
    MAX_EVENT_HISTORY,
};
