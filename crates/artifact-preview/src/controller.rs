use std::sync::{Arc, Mutex, MutexGuard};

use artifact_core::{ArtifactVersion, DiagnosticReport, Selection};
use artifact_sandbox::Bridge;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::metrics::PreviewMetrics;

/// Where the preview is in its run lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PreviewState {
    /// Nothing has run yet, or the last run was cancelled.
    #[default]
    Idle,
    Loading,
    /// Last run finished. `None` is a clean run or a dismissed error.
    Ready(Option<DiagnosticReport>),
}

impl PreviewState {
    pub fn is_loading(&self) -> bool {
        matches!(self, PreviewState::Loading)
    }

    pub fn report(&self) -> Option<&DiagnosticReport> {
        match self {
            PreviewState::Ready(Some(report)) => Some(report),
            _ => None,
        }
    }
}

struct InFlight {
    run_id: String,
    target: Selection,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    bridge: Option<Arc<Bridge>>,
    /// Bumped on every run and cancel; a result is applied only if its
    /// generation is still current.
    generation: u64,
    in_flight: Option<InFlight>,
    /// The version whose result the current `Ready` state shows.
    last_run: Option<ArtifactVersion>,
}

struct Shared {
    lifecycle: Mutex<Lifecycle>,
    state: watch::Sender<PreviewState>,
    metrics: Arc<PreviewMetrics>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancel_locked(&self, lifecycle: &mut Lifecycle) -> bool {
        let Some(in_flight) = lifecycle.in_flight.take() else {
            return false;
        };
        if in_flight.handle.is_finished() {
            return false;
        }
        in_flight.handle.abort();
        self.metrics.record_run_cancelled();
        tracing::debug!(
            run_id = %in_flight.run_id,
            target = %in_flight.target,
            "Cancelled in-flight run"
        );
        true
    }

    fn finish(&self, generation: u64, version: ArtifactVersion, run_id: &str, report: DiagnosticReport) {
        let target = version.selection();
        let mut lifecycle = self.lock();
        if lifecycle.generation != generation {
            self.metrics.record_stale_discarded();
            tracing::debug!(
                run_id,
                %target,
                generation,
                current = lifecycle.generation,
                "Discarding stale run result"
            );
            return;
        }
        lifecycle.in_flight = None;
        lifecycle.last_run = Some(version);

        if report.is_error() {
            self.metrics.record_run_failed();
            tracing::info!(run_id, %target, errors = report.errors.len(), "Preview run failed");
            self.state.send_replace(PreviewState::Ready(Some(report)));
        } else {
            self.metrics.record_run_succeeded();
            tracing::info!(run_id, %target, "Preview run succeeded");
            self.state.send_replace(PreviewState::Ready(None));
        }
    }
}

/// Handshake then run; every failure comes back as a report.
async fn execute(
    bridge: &Bridge,
    version: &ArtifactVersion,
    metrics: &PreviewMetrics,
) -> DiagnosticReport {
    if let Err(e) = bridge.ensure_ready().await {
        metrics.record_handshake_timeout();
        return DiagnosticReport::from_failure(e.to_string());
    }
    match bridge.try_run(version).await {
        Ok(Some(report)) => report,
        Ok(None) => DiagnosticReport::ok(),
        Err(e) => {
            metrics.record_communication_failure();
            tracing::warn!(
                group_id = %version.group_id,
                version_id = %version.id,
                error = %e,
                "Sandbox communication failed"
            );
            DiagnosticReport::from_failure(e.to_string())
        }
    }
}

/// Drives when code executes in the sandbox and what state the preview
/// shows.
///
/// Each [`run`](Self::run) supersedes the previous one: the earlier task is
/// aborted (dropping its pending remote call) and, should its result still
/// land, it is discarded because its generation is no longer current.
/// Dropping the controller cancels any in-flight run.
///
/// Runs are spawned onto the current Tokio runtime.
pub struct PreviewController {
    shared: Arc<Shared>,
}

impl PreviewController {
    pub fn new(metrics: Arc<PreviewMetrics>) -> Self {
        let (state, _) = watch::channel(PreviewState::Idle);
        Self {
            shared: Arc::new(Shared {
                lifecycle: Mutex::new(Lifecycle {
                    bridge: None,
                    generation: 0,
                    in_flight: None,
                    last_run: None,
                }),
                state,
                metrics,
            }),
        }
    }

    /// Take ownership of a sandbox. Any run against a previous sandbox is
    /// cancelled.
    pub fn attach(&self, bridge: Bridge) {
        let mut lifecycle = self.shared.lock();
        self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
        lifecycle.bridge = Some(Arc::new(bridge));
        tracing::debug!("Sandbox attached");
    }

    pub fn detach(&self) -> bool {
        let mut lifecycle = self.shared.lock();
        self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
        lifecycle.bridge.take().is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.shared.lock().bridge.is_some()
    }

    /// Start a run of `target`, superseding any run in flight.
    ///
    /// Returns the run's generation, or `None` when there is no sandbox or
    /// no current artifact (nothing happens in that case).
    pub fn run(&self, target: Option<&ArtifactVersion>) -> Option<u64> {
        let Some(version) = target else {
            tracing::debug!("No current artifact, nothing to run");
            return None;
        };

        let mut lifecycle = self.shared.lock();
        let Some(bridge) = lifecycle.bridge.clone() else {
            tracing::debug!("No sandbox attached, nothing to run");
            return None;
        };

        self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
        lifecycle.last_run = None;
        let generation = lifecycle.generation;
        let run_id = format!("run_{}", uuid::Uuid::new_v4().simple());
        let target = version.selection();

        self.shared.state.send_replace(PreviewState::Loading);
        self.shared.metrics.record_run_started();
        tracing::info!(%run_id, %target, generation, "Preview run started");

        let shared = Arc::clone(&self.shared);
        let version = version.clone();
        let task_run_id = run_id.clone();
        let handle = tokio::spawn(async move {
            let report = execute(&bridge, &version, &shared.metrics).await;
            shared.finish(generation, version, &task_run_id, report);
        });

        lifecycle.in_flight = Some(InFlight {
            run_id,
            target,
            handle,
        });
        Some(generation)
    }

    /// Abort the run in flight, if any. A preview that was loading goes
    /// back to `Idle`; a finished report is kept.
    pub fn cancel(&self) -> bool {
        let mut lifecycle = self.shared.lock();
        let cancelled = self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
        self.shared.state.send_if_modified(|state| {
            if state.is_loading() {
                *state = PreviewState::Idle;
                true
            } else {
                false
            }
        });
        cancelled
    }

    /// Abort any run and forget the last report.
    pub fn reset(&self) {
        let mut lifecycle = self.shared.lock();
        self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
        lifecycle.last_run = None;
        self.shared.state.send_if_modified(|state| {
            let changed = *state != PreviewState::Idle;
            *state = PreviewState::Idle;
            changed
        });
    }

    /// Clear the visible error without running anything.
    pub fn dismiss(&self) -> bool {
        let _lifecycle = self.shared.lock();
        self.shared.state.send_if_modified(|state| {
            if state.report().is_some() {
                *state = PreviewState::Ready(None);
                true
            } else {
                false
            }
        })
    }

    pub fn state(&self) -> PreviewState {
        self.shared.state.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading()
    }

    pub fn report(&self) -> Option<DiagnosticReport> {
        self.shared.state.borrow().report().cloned()
    }

    /// The visible error report together with the exact version that
    /// produced it.
    pub fn reported_run(&self) -> Option<(DiagnosticReport, ArtifactVersion)> {
        let lifecycle = self.shared.lock();
        let report = self.shared.state.borrow().report().cloned()?;
        Some((report, lifecycle.last_run.clone()?))
    }

    pub fn subscribe(&self) -> watch::Receiver<PreviewState> {
        self.shared.state.subscribe()
    }

    /// Wait until no run is loading and return the state at that point.
    pub async fn wait_settled(&self) -> PreviewState {
        let mut rx = self.subscribe();
        match rx.wait_for(|state| !state.is_loading()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    pub fn in_flight_target(&self) -> Option<Selection> {
        self.shared
            .lock()
            .in_flight
            .as_ref()
            .map(|f| f.target.clone())
    }

    pub fn metrics(&self) -> &Arc<PreviewMetrics> {
        &self.shared.metrics
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        let mut lifecycle = self.shared.lock();
        self.shared.cancel_locked(&mut lifecycle);
        lifecycle.generation += 1;
    }
}
