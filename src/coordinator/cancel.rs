//! Cooperative cancellation with a preserved cause.
//!
//! The coordinator creates one signal per task; `cancel()` may be invoked by
//! the cancellation API or by request-context teardown.  The engine observes
//! the signal at its next safe boundary; in-flight LLM and tool futures are
//! raced against [`CancelSignal::cancelled`].

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

/// Who asked for the cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedBy {
    User,
    System,
}

impl std::fmt::Display for RequestedBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestedBy::User => write!(f, "user"),
            RequestedBy::System => write!(f, "system"),
        }
    }
}

/// The preserved cancellation cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelCause {
    pub reason: String,
    pub requested_by: RequestedBy,
}

#[derive(Debug)]
struct Inner {
    flag: AtomicBool,
    cause: Mutex<Option<CancelCause>>,
    notify: Notify,
}

/// Cloneable cancellation handle shared between the coordinator, the engine
/// and in-flight tool executions.
#[derive(Clone)]
#[derive(Debug)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                flag: AtomicBool::new(false),
                cause: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }

    /// Cancel with a cause.  Idempotent; the first cause wins.
    pub fn cancel(&self, reason: impl Into<String>, requested_by: RequestedBy) {
        if !self.inner.flag.swap(true, Ordering::SeqCst) {
            if let Ok(mut slot) = self.inner.cause.lock() {
                *slot = Some(CancelCause {
                    reason: reason.into(),
                    requested_by,
                });
            }
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// The cause, once cancelled.
    pub fn cause(&self) -> Option<CancelCause> {
        self.inner.cause.lock().ok().and_then(|c| c.clone())
    }

    /// Resolve once the signal is cancelled.  Usable in `tokio::select!`
    /// against an in-flight LLM call or tool join.
    pub async fn cancelled(&self) {
        while !self.is_cancelled() {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::new()
    }
}
