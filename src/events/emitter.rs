//! Per-task event emitter: stamps envelopes with identity, records them for
//! session replay, and publishes to the bus.

use std::sync::{Arc, Mutex};

use super::bus::SessionEventBus;
use super::types::{AgentLevel, EventEnvelope, WorkflowEvent};

/// Emits one task's events in causal order.
///
/// Every event is recorded into the task-local history *before* it is
/// published, so terminal events can always be recovered via replay even if
/// a subscriber lagged past the broadcast ring.
#[derive(Clone)]
pub struct TaskEventEmitter {
    bus: Arc<SessionEventBus>,
    recorded: Arc<Mutex<Vec<EventEnvelope>>>,
    session_id: String,
    task_id: String,
    run_id: String,
    level: AgentLevel,
}

impl TaskEventEmitter {
    pub fn new(
        bus: Arc<SessionEventBus>,
        session_id: impl Into<String>,
        task_id: impl Into<String>,
        run_id: impl Into<String>,
        level: AgentLevel,
    ) -> Self {
        Self {
            bus,
            recorded: Arc::new(Mutex::new(Vec::new())),
            session_id: session_id.into(),
            task_id: task_id.into(),
            run_id: run_id.into(),
            level,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn emit(&self, event: WorkflowEvent) {
        self.emit_with_level(event, self.level);
    }

    /// Emit with an explicit agent level, e.g. sub-agent boundary markers
    /// produced by the parent task.
    pub fn emit_with_level(&self, event: WorkflowEvent, level: AgentLevel) {
        let envelope = EventEnvelope::new(&self.session_id, event)
            .with_task(&self.task_id, &self.run_id)
            .with_level(level);
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(envelope.clone());
        }
        self.bus.publish(envelope);
    }

    /// All events emitted so far, in emission order.
    pub fn recorded(&self) -> Vec<EventEnvelope> {
        self.recorded.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_records_before_publish() {
        let bus = Arc::new(SessionEventBus::new());
        let emitter = TaskEventEmitter::new(bus, "s1", "t1", "r1", AgentLevel::Core);

        emitter.emit(WorkflowEvent::InputReceived {
            task: "hello".into(),
        });

        let recorded = emitter.recorded();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].task_id.as_deref(), Some("t1"));
        assert_eq!(recorded[0].run_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn emitted_events_reach_subscribers() {
        let bus = Arc::new(SessionEventBus::new());
        let mut rx = bus.subscribe("s1");
        let emitter = TaskEventEmitter::new(bus, "s1", "t1", "r1", AgentLevel::Sub);

        emitter.emit(WorkflowEvent::SubflowProgress {
            subtask_id: "sub".into(),
            message: "working".into(),
        });

        let got = rx.recv().await.unwrap();
        assert_eq!(got.agent_level, AgentLevel::Sub);
        assert_eq!(got.event.kind(), "workflow.subflow.progress");
    }
}
