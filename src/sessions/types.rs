//! Persistent session records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ai::types::Message;
use crate::events::EventEnvelope;

/// Bounded per-session event history retained for SSE replay.
pub const MAX_EVENT_HISTORY: usize = 1000;

// ─── TodoItem ────────────────────────────────────────────────────────────────

/// One entry of the agent-managed task tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    /// `"pending"`, `"in_progress"` or `"done"`.
    pub status: String,
}

impl TodoItem {
    pub fn new(title: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            status: status.into(),
        }
    }
}

// ─── Cost accounting ─────────────────────────────────────────────────────────

/// Token/cost spend attributed to one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderCost {
    pub total_tokens: u64,
    pub usd: f64,
}

/// Cumulative cost of a session.  Per-task accumulators are merged in only
/// at save time; nothing here is shared mutable state during execution.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CostAccumulator {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    #[serde(default)]
    pub by_provider: BTreeMap<String, ProviderCost>,
}

impl CostAccumulator {
    pub fn merge(&mut self, task: &TaskCost) {
        self.prompt_tokens += task.prompt_tokens;
        self.completion_tokens += task.completion_tokens;
        self.total_tokens += task.total_tokens;
        let entry = self.by_provider.entry(task.provider.clone()).or_default();
        entry.total_tokens += task.total_tokens;
        entry.usd += task.usd;
    }
}

/// Per-task cost accumulator, owned by the task state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TaskCost {
    pub provider: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub usd: f64,
}

impl TaskCost {
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Record one completion's usage, deriving USD from the provider's
    /// approximate list price.
    pub fn record(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.prompt_tokens += prompt_tokens;
        self.completion_tokens += completion_tokens;
        self.total_tokens += prompt_tokens + completion_tokens;
        let (input_per_1k, output_per_1k) = price_per_1k(&self.provider);
        self.usd += (prompt_tokens as f64 / 1000.0) * input_per_1k
            + (completion_tokens as f64 / 1000.0) * output_per_1k;
    }
}

/// Approximate list prices in USD per 1k tokens (input, output).
fn price_per_1k(provider: &str) -> (f64, f64) {
    match provider {
        "openai" => (0.000_15, 0.000_60),
        "deepseek" => (0.000_14, 0.000_28),
        "openrouter" => (0.003, 0.015),
        _ => (0.0, 0.0), // local providers are free
    }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// A persistent multi-turn conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub cost: CostAccumulator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub todos: Vec<TodoItem>,
    /// Event history retained for SSE replay, bounded at
    /// [`MAX_EVENT_HISTORY`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<EventEnvelope>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            cost: CostAccumulator::default(),
            label: None,
            todos: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn with_fresh_id() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    /// Append new messages, bumping `updated_at`.
    pub fn append_messages(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.updated_at = Utc::now();
    }

    /// Record an event for replay, dropping the oldest past the bound.
    pub fn push_event(&mut self, event: EventEnvelope) {
        self.events.push(event);
        if self.events.len() > MAX_EVENT_HISTORY {
            let excess = self.events.len() - MAX_EVENT_HISTORY;
            self.events.drain(0..excess);
        }
    }
}

/// Listing row for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(s: &Session) -> Self {
        Self {
            id: s.id.clone(),
            label: s.label.clone(),
            created_at: s.created_at,
            updated_at: s.updated_at,
            message_count: s.messages.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WorkflowEvent;

    #[test]
    fn cost_merge_accumulates_per_provider() {
        let mut session_cost = CostAccumulator::default();

        let mut task1 = TaskCost::new("openai");
        task1.record(1000, 500);
        let mut task2 = TaskCost::new("openai");
        task2.record(2000, 1000);

        session_cost.merge(&task1);
        session_cost.merge(&task2);

        assert_eq!(session_cost.prompt_tokens, 3000);
        assert_eq!(session_cost.completion_tokens, 1500);
        assert_eq!(session_cost.total_tokens, 4500);
        let openai = &session_cost.by_provider["openai"];
        assert_eq!(openai.total_tokens, 4500);
        assert!(openai.usd > 0.0);
    }

    #[test]
    fn local_provider_costs_nothing() {
        let mut task = TaskCost::new("ollama");
        task.record(10_000, 10_000);
        assert_eq!(task.usd, 0.0);
        assert_eq!(task.total_tokens, 20_000);
    }

    #[test]
    fn event_history_is_bounded() {
        let mut session = Session::new("s");
        for i in 0..(MAX_EVENT_HISTORY + 50) {
            session.push_event(EventEnvelope::new(
                "s",
                WorkflowEvent::NodeOutputDelta {
                    delta: i.to_string(),
                },
            ));
        }
        assert_eq!(session.events.len(), MAX_EVENT_HISTORY);
        // The oldest 50 were dropped.
        match &session.events[0].event {
            WorkflowEvent::NodeOutputDelta { delta } => assert_eq!(delta, "50"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn append_messages_bumps_updated_at() {
        let mut session = Session::new("s");
        let before = session.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        session.append_messages(vec![Message::user("hi")]);
        assert!(session.updated_at > before);
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn session_serializes_without_empty_optionals() {
        let session = Session::new("s1");
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("label").is_none());
        assert!(json.get("todos").is_none());
        assert_eq!(json["id"], "s1");
    }
}
