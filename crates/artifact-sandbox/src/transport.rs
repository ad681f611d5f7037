use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

use artifact_core::DiagnosticReport;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::BridgeError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope, RunParams, SandboxRequest};

/// One request/response exchange with a sandbox.
///
/// Implementations only move envelopes; correlation and serialization of
/// calls is the client's job.
pub trait SandboxTransport: Send + Sync {
    fn exchange<'a>(
        &'a self,
        request: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseEnvelope, BridgeError>> + Send + 'a>>;
}

/// Sandbox-side behavior, abstracted so an in-process sandbox (or a test
/// double) can sit behind a [`ChannelTransport`].
///
/// `run` must not fail for compile errors in the user's code; those are a
/// `DiagnosticReport`. `Err` is reserved for the call itself failing.
pub trait SandboxHandler: Send + Sync {
    fn init<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<bool, String>> + Send + 'a>>;

    fn run<'a>(
        &'a self,
        params: &'a RunParams,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DiagnosticReport>, String>> + Send + 'a>>;
}

impl<T: SandboxHandler + ?Sized> SandboxHandler for Arc<T> {
    fn init<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<bool, String>> + Send + 'a>> {
        (**self).init()
    }

    fn run<'a>(
        &'a self,
        params: &'a RunParams,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DiagnosticReport>, String>> + Send + 'a>> {
        (**self).run(params)
    }
}

/// Answer one envelope with a handler.
pub async fn dispatch<H: SandboxHandler + ?Sized>(
    handler: &H,
    envelope: RequestEnvelope,
) -> ResponseEnvelope {
    let id = envelope.id;
    let request = match SandboxRequest::try_from(envelope) {
        Ok(request) => request,
        Err(e) => return ResponseEnvelope::failed(id, e.to_string()),
    };

    match request {
        SandboxRequest::Init => match handler.init().await {
            Ok(ready) => ResponseEnvelope::ok(id, serde_json::Value::Bool(ready)),
            Err(e) => ResponseEnvelope::failed(id, e),
        },
        SandboxRequest::Run(params) => match handler.run(&params).await {
            Ok(Some(report)) => match serde_json::to_value(&report) {
                Ok(value) => ResponseEnvelope::ok(id, value),
                Err(e) => ResponseEnvelope::failed(id, e.to_string()),
            },
            Ok(None) => ResponseEnvelope::ok(id, serde_json::Value::Null),
            Err(e) => ResponseEnvelope::failed(id, e),
        },
    }
}

/// A request delivered to the sandbox side of a channel.
pub struct Incoming {
    pub envelope: RequestEnvelope,
    reply: oneshot::Sender<ResponseEnvelope>,
}

impl Incoming {
    /// Send the response. Returns false if the caller has gone away.
    pub fn respond(self, response: ResponseEnvelope) -> bool {
        self.reply.send(response).is_ok()
    }
}

/// Host end of an in-process message channel.
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Incoming>,
}

/// Sandbox end of an in-process message channel. Dropping it closes the
/// channel.
pub struct SandboxPort {
    rx: mpsc::Receiver<Incoming>,
}

/// Create a connected transport/port pair.
pub fn channel(capacity: usize) -> (ChannelTransport, SandboxPort) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ChannelTransport { tx }, SandboxPort { rx })
}

impl ChannelTransport {
    pub fn new(capacity: usize) -> (Self, SandboxPort) {
        channel(capacity)
    }
}

impl SandboxTransport for ChannelTransport {
    fn exchange<'a>(
        &'a self,
        request: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseEnvelope, BridgeError>> + Send + 'a>> {
        Box::pin(async move {
            let (reply, response) = oneshot::channel();
            self.tx
                .send(Incoming {
                    envelope: request,
                    reply,
                })
                .await
                .map_err(|_| BridgeError::ChannelClosed)?;
            response.await.map_err(|_| BridgeError::ChannelClosed)
        })
    }
}

impl SandboxPort {
    pub async fn recv(&mut self) -> Option<Incoming> {
        self.rx.recv().await
    }

    /// Answer requests one at a time until the host side is dropped.
    pub async fn serve<H: SandboxHandler>(mut self, handler: H) {
        while let Some(incoming) = self.rx.recv().await {
            let id = incoming.envelope.id;
            let method = incoming.envelope.method;
            let response = dispatch(&handler, incoming.envelope.clone()).await;
            if !incoming.respond(response) {
                tracing::debug!(id, %method, "Caller went away before the sandbox replied");
            }
        }
        tracing::debug!("Sandbox port closed");
    }

    pub fn spawn<H: SandboxHandler + 'static>(self, handler: H) -> JoinHandle<()> {
        tokio::spawn(self.serve(handler))
    }
}

/// Deterministic sandbox for tests and dry runs.
///
/// Answers `init` with `false` for the first `ready_after` probes, then
/// `true`. Each `run` returns the next scripted report, cycling.
pub struct StubSandbox {
    ready_after: u32,
    reports: Vec<Option<DiagnosticReport>>,
    probes: AtomicU32,
    runs: AtomicUsize,
}

impl StubSandbox {
    pub fn new(reports: Vec<Option<DiagnosticReport>>) -> Self {
        Self {
            ready_after: 0,
            reports,
            probes: AtomicU32::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    /// Ready immediately, every run succeeds.
    pub fn ok() -> Self {
        Self::new(vec![None])
    }

    /// Every run reports the same diagnostics.
    pub fn constant(report: DiagnosticReport) -> Self {
        Self::new(vec![Some(report)])
    }

    pub fn ready_after(mut self, probes: u32) -> Self {
        self.ready_after = probes;
        self
    }

    pub fn never_ready(self) -> Self {
        self.ready_after(u32::MAX)
    }

    pub fn probe_count(&self) -> u32 {
        self.probes.load(Ordering::Relaxed)
    }

    pub fn run_count(&self) -> usize {
        self.runs.load(Ordering::Relaxed)
    }
}

impl SandboxHandler for StubSandbox {
    fn init<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<bool, String>> + Send + 'a>> {
        Box::pin(async move {
            let seen = self.probes.fetch_add(1, Ordering::Relaxed);
            Ok(seen >= self.ready_after)
        })
    }

    fn run<'a>(
        &'a self,
        _params: &'a RunParams,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DiagnosticReport>, String>> + Send + 'a>> {
        Box::pin(async move {
            let idx = self.runs.fetch_add(1, Ordering::Relaxed);
            if self.reports.is_empty() {
                return Ok(None);
            }
            Ok(self.reports[idx % self.reports.len()].clone())
        })
    }
}
