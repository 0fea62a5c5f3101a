//! Sandbox manager: lazy initialization, health probing, and the cached
//! environment snapshot.
//!
//! Construction is pure.  `initialize` runs once from the container's Start
//! phase: it probes the service with a trivial shell echo and, on failure,
//! marks the manager not-ready while a background task keeps re-probing with
//! exponential backoff (1 s start, 30 s cap).  After
//! [`MAX_INIT_ATTEMPTS`] consecutive failures the manager reports permanent
//! failure and sandbox-routed tools terminate their task fatally.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use tokio::sync::Mutex as AsyncMutex;

use crate::config::SandboxConfig;
use crate::events::{EventEnvelope, SessionEventBus, WorkflowEvent};

use super::client::{SandboxError, SandboxHttpClient};

/// Backoff schedule for background re-initialization.
const BACKOFF_START: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Consecutive probe failures before the sandbox is declared permanently
/// unreachable.
const MAX_INIT_ATTEMPTS: u32 = 10;

/// Session id used for diagnostics that are not tied to a task.
pub const DIAGNOSTIC_SESSION: &str = "system";

// ─── SandboxAvailability ─────────────────────────────────────────────────────

/// What a caller should do with a sandbox-routed operation right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxAvailability {
    /// Healthy; operations may proceed.
    Ready,
    /// Not (yet) reachable; surface a non-fatal observation.
    Unreachable,
    /// Declared permanently unreachable; tasks must terminate fatally.
    PermanentFailure,
}

// ─── SandboxManager ──────────────────────────────────────────────────────────

/// Owns the remote-client objects and the cached environment snapshot.
/// Safe for concurrent use.
#[derive(Debug)]
pub struct SandboxManager {
    client: SandboxHttpClient,
    init_timeout: Duration,
    initialized: AtomicBool,
    ready: AtomicBool,
    permanent: AtomicBool,
    failed_attempts: AtomicU32,
    last_error: Mutex<Option<String>>,
    /// Sandbox environment captured once via `printenv`; errors never
    /// populate the cache.
    env_cache: AsyncMutex<Option<BTreeMap<String, String>>>,
    bus: Option<Arc<SessionEventBus>>,
}

impl SandboxManager {
    /// Build the manager.  Pure: no I/O happens here.
    pub fn new(
        base_url: impl Into<String>,
        config: &SandboxConfig,
        bus: Option<Arc<SessionEventBus>>,
    ) -> Result<Self, String> {
        let client =
            SandboxHttpClient::new(base_url, Duration::from_secs(config.op_timeout_secs))?;
        Ok(Self {
            client,
            init_timeout: Duration::from_secs(config.init_timeout_secs),
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            permanent: AtomicBool::new(false),
            failed_attempts: AtomicU32::new(0),
            last_error: Mutex::new(None),
            env_cache: AsyncMutex::new(None),
            bus,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Probe the sandbox once.  Called from the container's Start phase; on
    /// failure the manager stays usable but not-ready, and the caller should
    /// spawn [`background_reinit`](Self::background_reinit).
    pub async fn initialize(&self) -> Result<(), SandboxError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Ok(()); // Initialize is one-shot.
        }
        self.emit_progress("running", "probe", 1, 1, "probing sandbox", None);
        match self.probe().await {
            Ok(()) => {
                self.mark_ready();
                self.emit_progress("ok", "probe", 1, 1, "sandbox reachable", None);
                Ok(())
            }
            Err(e) => {
                self.mark_failed(&e);
                self.emit_progress("error", "probe", 1, 1, "sandbox probe failed", Some(&e));
                Err(e)
            }
        }
    }

    /// Keep re-probing with exponential backoff until ready or the attempt
    /// budget is exhausted.  Intended to be `tokio::spawn`ed after a failed
    /// [`initialize`](Self::initialize).
    pub async fn background_reinit(self: Arc<Self>) {
        let mut delay = BACKOFF_START;
        loop {
            if self.is_ready() || self.is_permanently_failed() {
                return;
            }
            tokio::time::sleep(delay).await;
            match self.probe().await {
                Ok(()) => {
                    self.mark_ready();
                    self.emit_progress("ok", "reinit", 1, 1, "sandbox recovered", None);
                    return;
                }
                Err(e) => {
                    let attempts = self.mark_failed(&e);
                    log::warn!(
                        "sandbox re-init attempt {attempts}/{MAX_INIT_ATTEMPTS} failed: {e}"
                    );
                    if attempts >= MAX_INIT_ATTEMPTS {
                        self.permanent.store(true, Ordering::SeqCst);
                        self.emit_progress(
                            "error",
                            "reinit",
                            attempts as usize,
                            MAX_INIT_ATTEMPTS as usize,
                            "sandbox declared permanently unreachable",
                            Some(&e),
                        );
                        return;
                    }
                }
            }
            delay = (delay * 2).min(BACKOFF_CAP);
        }
    }

    /// Repeat the echo probe; used by health checks.
    pub async fn health_check(&self) -> Result<(), SandboxError> {
        let result = self.probe().await;
        match &result {
            Ok(()) => self.mark_ready(),
            Err(e) if e.is_connectivity() => self.ready.store(false, Ordering::SeqCst),
            Err(_) => {}
        }
        result
    }

    async fn probe(&self) -> Result<(), SandboxError> {
        let exec = self.client.shell_exec("echo alex-probe", Some(self.init_timeout));
        let result = tokio::time::timeout(self.init_timeout, exec)
            .await
            .map_err(|_| SandboxError::Timeout)??;
        if result.exit_code == 0 && result.stdout.contains("alex-probe") {
            Ok(())
        } else {
            Err(SandboxError::Other(format!(
                "probe returned exit code {}",
                result.exit_code
            )))
        }
    }

    fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
        self.failed_attempts.store(0, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = None;
        }
    }

    fn mark_failed(&self, e: &SandboxError) -> u32 {
        self.ready.store(false, Ordering::SeqCst);
        if let Ok(mut slot) = self.last_error.lock() {
            *slot = Some(e.to_string());
        }
        self.failed_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }

    // ── Status ───────────────────────────────────────────────────────────────

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.permanent.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|e| e.clone())
    }

    /// Routing decision for a sandbox-bound tool operation.
    pub fn availability(&self) -> SandboxAvailability {
        if self.is_permanently_failed() {
            SandboxAvailability::PermanentFailure
        } else if self.is_ready() {
            SandboxAvailability::Ready
        } else {
            SandboxAvailability::Unreachable
        }
    }

    // ── Clients ──────────────────────────────────────────────────────────────

    /// The wire client.  Callers must check [`availability`](Self::availability)
    /// first; operations against a not-ready sandbox fail with transport
    /// errors.
    pub fn client(&self) -> &SandboxHttpClient {
        &self.client
    }

    // ── Environment snapshot ─────────────────────────────────────────────────

    /// Capture the sandbox environment once (by executing `printenv`) and
    /// cache it.  Failures return the error without mutating the cache.
    pub async fn environment(&self) -> Result<BTreeMap<String, String>, SandboxError> {
        let mut cache = self.env_cache.lock().await;
        if let Some(env) = cache.as_ref() {
            return Ok(env.clone());
        }

        let exec = self.client.shell_exec("printenv", None).await?;
        if exec.exit_code != 0 {
            return Err(SandboxError::Other(format!(
                "printenv exited with code {}",
                exec.exit_code
            )));
        }

        let env = parse_printenv(&exec.stdout);
        *cache = Some(env.clone());
        Ok(env)
    }

    fn emit_progress(
        &self,
        status: &str,
        stage: &str,
        step: usize,
        total_steps: usize,
        message: &str,
        error: Option<&SandboxError>,
    ) {
        if let Some(bus) = &self.bus {
            bus.publish(EventEnvelope::new(
                DIAGNOSTIC_SESSION,
                WorkflowEvent::SandboxProgress {
                    status: status.to_string(),
                    stage: stage.to_string(),
                    step,
                    total_steps,
                    message: message.to_string(),
                    error: error.map(|e| e.to_string()),
                },
            ));
        }
    }
}

/// Parse `printenv` output into a sorted map.  Lines without `=` are
/// ignored; continuation lines of multi-line values are dropped.
fn parse_printenv(stdout: &str) -> BTreeMap<String, String> {
    stdout
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            if key.is_empty() || key.chars().any(|c| c.is_whitespace()) {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}
