//! Per-session event fan-out.
//!
//! One `tokio::sync::broadcast` channel per session id.  The broadcast ring
//! buffer gives the required drop-oldest backpressure behaviour: a slow
//! subscriber that falls more than `capacity` events behind observes
//! `RecvError::Lagged(n)`, and `n` is accounted against the bus-wide drop
//! counter.  Publishers never block on delivery.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use tokio::sync::broadcast;

use super::types::EventEnvelope;

const DEFAULT_CAPACITY: usize = 1024;

/// Per-session publish/subscribe bus for [`EventEnvelope`]s.
#[derive(Debug)]
pub struct SessionEventBus {
    senders: RwLock<HashMap<String, broadcast::Sender<EventEnvelope>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl SessionEventBus {
    /// Create with the default per-subscriber buffer capacity (1024).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create with an explicit per-subscriber buffer capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            senders: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
        }
    }

    /// Publish an event to all subscribers of its session.
    ///
    /// Publishing to a session with no subscribers is a no-op, not an error.
    pub fn publish(&self, envelope: EventEnvelope) {
        let sender = self.sender_for(&envelope.session_id);
        // `send` fails only when there are no receivers — that is fine.
        let _ = sender.send(envelope);
    }

    /// Subscribe to a session's event stream.
    ///
    /// Dropping the returned receiver unsubscribes.  Events published after
    /// this call are observed in emission order; a lagging receiver skips
    /// the oldest events and reports how many via `Lagged(n)` (callers
    /// should pass `n` to [`record_lag`](Self::record_lag)).
    pub fn subscribe(&self, session_id: &str) -> broadcast::Receiver<EventEnvelope> {
        self.sender_for(session_id).subscribe()
    }

    /// Account for events a subscriber skipped after observing `Lagged(n)`.
    pub fn record_lag(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    /// Total events dropped across all subscribers (backpressure metric).
    pub fn dropped_total(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Number of sessions with at least one live subscriber.
    pub fn active_sessions(&self) -> usize {
        self.senders
            .read()
            .map(|m| m.values().filter(|s| s.receiver_count() > 0).count())
            .unwrap_or(0)
    }

    /// Drop the channel for a session that no longer exists.
    pub fn remove_session(&self, session_id: &str) {
        if let Ok(mut map) = self.senders.write() {
            map.remove(session_id);
        }
    }

    fn sender_for(&self, session_id: &str) -> broadcast::Sender<EventEnvelope> {
        if let Ok(map) = self.senders.read() {
            if let Some(sender) = map.get(session_id) {
                return sender.clone();
            }
        }
        let mut map = match self.senders.write() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::WorkflowEvent;
    use tokio::sync::broadcast::error::RecvError;

    fn input(session: &str, task: &str) -> EventEnvelope {
        EventEnvelope::new(
            session,
            WorkflowEvent::InputReceived {
                task: task.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn publish_then_receive() {
        let bus = SessionEventBus::new();
        let mut rx = bus.subscribe("s1");

        bus.publish(input("s1", "hello"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, "s1");
        assert!(matches!(
            received.event,
            WorkflowEvent::InputReceived { .. }
        ));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let bus = SessionEventBus::new();
        let mut rx_a = bus.subscribe("a");
        let mut rx_b = bus.subscribe("b");

        bus.publish(input("a", "for a"));

        let got = rx_a.recv().await.unwrap();
        assert_eq!(got.session_id, "a");
        assert!(rx_b.try_recv().is_err(), "session b must not see a's events");
    }

    #[tokio::test]
    async fn multiple_subscribers_all_receive_in_order() {
        let bus = SessionEventBus::new();
        let mut rx1 = bus.subscribe("s");
        let mut rx2 = bus.subscribe("s");

        for i in 0..5 {
            bus.publish(input("s", &format!("t{i}")));
        }

        for rx in [&mut rx1, &mut rx2] {
            for i in 0..5 {
                let got = rx.recv().await.unwrap();
                match got.event {
                    WorkflowEvent::InputReceived { task } => {
                        assert_eq!(task, format!("t{i}"))
                    }
                    other => panic!("unexpected event: {other:?}"),
                }
            }
        }
    }

    #[tokio::test]
    async fn lagged_receiver_drops_oldest() {
        let bus = SessionEventBus::with_capacity(2);
        let mut slow_rx = bus.subscribe("s");

        for i in 0..5 {
            bus.publish(input("s", &format!("t{i}")));
        }

        // Oldest events were overwritten; the receiver reports the skip.
        match slow_rx.recv().await {
            Err(RecvError::Lagged(n)) => {
                bus.record_lag(n);
                assert_eq!(n, 3);
            }
            other => panic!("expected Lagged, got {other:?}"),
        }
        assert_eq!(bus.dropped_total(), 3);

        // The newest events are still observable, in order.
        let got = slow_rx.recv().await.unwrap();
        match got.event {
            WorkflowEvent::InputReceived { task } => assert_eq!(task, "t3"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_noop() {
        let bus = SessionEventBus::new();
        bus.publish(input("ghost", "nobody listening"));
        assert_eq!(bus.dropped_total(), 0);
    }
}
