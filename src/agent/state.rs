//! Per-task mutable state and the final result record.

use serde::{Deserialize, Serialize};

use crate::ai::types::Message;
use crate::sessions::TaskCost;

// ─── StopReason ──────────────────────────────────────────────────────────────

/// Why a task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    FinalAnswer,
    MaxIterations,
    Cancelled,
    ToolFatal,
    LlmFatal,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::FinalAnswer => write!(f, "final_answer"),
            StopReason::MaxIterations => write!(f, "max_iterations"),
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::ToolFatal => write!(f, "tool_fatal"),
            StopReason::LlmFatal => write!(f, "llm_fatal"),
        }
    }
}

impl StopReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, StopReason::ToolFatal | StopReason::LlmFatal)
    }
}

// ─── TaskState ───────────────────────────────────────────────────────────────

/// Mutable state of one task run.  Constructed from session history at task
/// start, mutated only by the engine, and discarded after the result is
/// persisted back to the session.
#[derive(Debug)]
pub struct TaskState {
    /// Prompt view: session history plus this task's turns, ending with the
    /// user turn before the engine starts.  Compression may rewrite this.
    pub messages: Vec<Message>,
    /// Audit trail of turns produced by this task, in production order.
    /// Never rewritten by compression; this is what the session save
    /// appends.
    pub produced: Vec<Message>,
    /// Completed Think/Act/Observe iterations.
    pub iterations: usize,
    /// Last-known token estimate of `messages`.
    pub token_estimate: usize,
    /// Per-task cost accumulator.
    pub cost: TaskCost,
    pub done: bool,
    pub final_answer: String,
}

impl TaskState {
    /// Build task state from session history (which already ends with the
    /// task's user turn in the prompt view).
    pub fn new(history: Vec<Message>, provider: &str) -> Self {
        Self {
            messages: history,
            produced: Vec::new(),
            iterations: 0,
            token_estimate: 0,
            cost: TaskCost::new(provider),
            done: false,
            final_answer: String::new(),
        }
    }

    /// Record a turn produced by this task in both the prompt view and the
    /// audit trail.
    pub fn push_turn(&mut self, message: Message) {
        self.produced.push(message.clone());
        self.messages.push(message);
    }

    /// Messages produced during this task, unaffected by compression.
    pub fn new_messages(&self) -> &[Message] {
        &self.produced
    }

    /// Last non-empty assistant content, used as the answer when the
    /// iteration budget runs out.
    pub fn last_assistant_content(&self) -> String {
        self.messages
            .iter()
            .rev()
            .find(|m| {
                m.role == crate::ai::types::MessageRole::Assistant && !m.content.is_empty()
            })
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }
}

// ─── TaskResult ──────────────────────────────────────────────────────────────

/// Final output of one task run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub final_answer: String,
    /// Full message trace for audit.
    pub messages: Vec<Message>,
    pub iterations: usize,
    pub tokens_used: u64,
    pub stop_reason: StopReason,
    /// Populated for fatal stop reasons and cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_reason_wire_format() {
        assert_eq!(
            serde_json::to_string(&StopReason::FinalAnswer).unwrap(),
            "\"final_answer\""
        );
        assert_eq!(StopReason::MaxIterations.to_string(), "max_iterations");
        assert!(StopReason::ToolFatal.is_fatal());
        assert!(!StopReason::Cancelled.is_fatal());
    }

    #[test]
    fn push_turn_feeds_prompt_and_audit_views() {
        let history = vec![Message::user("old")];
        let mut state = TaskState::new(history, "openai");
        state.push_turn(Message::assistant("new"));
        assert_eq!(state.messages.len(), 2);
        let tail = state.new_messages();
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].content, "new");
    }

    #[test]
    fn audit_trail_survives_prompt_rewrites() {
        let mut state = TaskState::new(vec![Message::user("old")], "openai");
        state.push_turn(Message::assistant("answer"));
        // A compression pass may rewrite the prompt view entirely.
        state.messages = vec![Message::assistant("summary")];
        assert_eq!(state.new_messages().len(), 1);
        assert_eq!(state.new_messages()[0].content, "answer");
    }

    #[test]
    fn last_assistant_content_skips_empty() {
        let mut state = TaskState::new(vec![], "openai");
        state.push_turn(Message::assistant("useful"));
        state.push_turn(Message::assistant(""));
        assert_eq!(state.last_assistant_content(), "useful");
    }
}
