use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for metrics backends. Implementations can forward to Prometheus,
/// StatsD, or simply log metrics.
pub trait MetricsBackend: Send + Sync {
    fn record_counter(&self, name: &str, value: u64);
}

/// Counters for the preview run lifecycle.
pub struct PreviewMetrics {
    pub runs_started: AtomicU64,
    pub runs_succeeded: AtomicU64,
    pub runs_failed: AtomicU64,
    pub communication_failures: AtomicU64,
    pub handshake_timeouts: AtomicU64,
    pub runs_cancelled: AtomicU64,
    pub stale_results_discarded: AtomicU64,
    pub send_backs: AtomicU64,
    backend: Option<Arc<dyn MetricsBackend>>,
}

impl std::fmt::Debug for PreviewMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreviewMetrics")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

impl Default for PreviewMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            communication_failures: AtomicU64::new(0),
            handshake_timeouts: AtomicU64::new(0),
            runs_cancelled: AtomicU64::new(0),
            stale_results_discarded: AtomicU64::new(0),
            send_backs: AtomicU64::new(0),
            backend: None,
        }
    }

    pub fn with_backend(backend: Arc<dyn MetricsBackend>) -> Self {
        Self {
            backend: Some(backend),
            ..Self::new()
        }
    }

    fn bump(&self, counter: &AtomicU64, name: &str) {
        let val = counter.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(backend) = &self.backend {
            backend.record_counter(name, val);
        }
    }

    pub fn record_run_started(&self) {
        self.bump(&self.runs_started, "artifact.preview.runs_started");
    }

    pub fn record_run_succeeded(&self) {
        self.bump(&self.runs_succeeded, "artifact.preview.runs_succeeded");
    }

    /// The code ran and produced error diagnostics.
    pub fn record_run_failed(&self) {
        self.bump(&self.runs_failed, "artifact.preview.runs_failed");
    }

    pub fn record_communication_failure(&self) {
        self.bump(
            &self.communication_failures,
            "artifact.preview.communication_failures",
        );
    }

    pub fn record_handshake_timeout(&self) {
        self.bump(&self.handshake_timeouts, "artifact.preview.handshake_timeouts");
    }

    pub fn record_run_cancelled(&self) {
        self.bump(&self.runs_cancelled, "artifact.preview.runs_cancelled");
    }

    pub fn record_stale_discarded(&self) {
        self.bump(
            &self.stale_results_discarded,
            "artifact.preview.stale_results_discarded",
        );
    }

    pub fn record_send_back(&self) {
        self.bump(&self.send_backs, "artifact.preview.send_backs");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            runs_succeeded: self.runs_succeeded.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            communication_failures: self.communication_failures.load(Ordering::Relaxed),
            handshake_timeouts: self.handshake_timeouts.load(Ordering::Relaxed),
            runs_cancelled: self.runs_cancelled.load(Ordering::Relaxed),
            stale_results_discarded: self.stale_results_discarded.load(Ordering::Relaxed),
            send_backs: self.send_backs.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of preview metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub runs_started: u64,
    pub runs_succeeded: u64,
    pub runs_failed: u64,
    pub communication_failures: u64,
    pub handshake_timeouts: u64,
    pub runs_cancelled: u64,
    pub stale_results_discarded: u64,
    pub send_backs: u64,
}

/// Logging-based metrics backend. Emits metrics as structured log events.
pub struct LoggingMetricsBackend;

impl MetricsBackend for LoggingMetricsBackend {
    fn record_counter(&self, name: &str, value: u64) {
        tracing::info!(metric = name, value = value, kind = "counter", "metric");
    }
}
