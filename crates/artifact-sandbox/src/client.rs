use std::sync::atomic::{AtomicU64, Ordering};

use artifact_core::DiagnosticReport;
use tokio::sync::Mutex;

use crate::error::BridgeError;
use crate::protocol::{RunParams, SandboxRequest, is_truthy};
use crate::transport::SandboxTransport;

/// Typed RPC client for one sandbox instance.
///
/// Calls are queued so at most one request is outstanding at a time; the
/// sandbox is only assumed to answer in order for a single caller. A call
/// that is dropped mid-flight releases its turn.
///
/// `RemoteApi` is not `Clone`: a sandbox belongs to exactly one owner.
pub struct RemoteApi {
    transport: Box<dyn SandboxTransport>,
    queue: Mutex<()>,
    next_id: AtomicU64,
}

/// Wrap a sandbox endpoint in a typed client.
pub fn attach(transport: impl SandboxTransport + 'static) -> RemoteApi {
    RemoteApi {
        transport: Box::new(transport),
        queue: Mutex::new(()),
        next_id: AtomicU64::new(1),
    }
}

impl RemoteApi {
    async fn call(&self, request: SandboxRequest) -> Result<serde_json::Value, BridgeError> {
        let _turn = self.queue.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let method = request.method();
        tracing::trace!(id, %method, "Sandbox call");

        let response = self.transport.exchange(request.into_envelope(id)).await?;
        if response.id != id {
            return Err(BridgeError::ProtocolError(format!(
                "response id {} does not match request {id}",
                response.id
            )));
        }
        if let Some(error) = response.error {
            return Err(BridgeError::RemoteError(error));
        }
        Ok(response.result)
    }

    /// Ask whether the sandbox is ready to accept `run`.
    pub async fn init(&self) -> Result<bool, BridgeError> {
        let result = self.call(SandboxRequest::Init).await?;
        Ok(is_truthy(&result))
    }

    /// Execute code in the sandbox.
    ///
    /// `Ok(None)` is a run that produced no report. Compile and runtime
    /// failures of the code itself come back as `Ok(Some(report))`; `Err` is
    /// only for the exchange failing.
    pub async fn run(
        &self,
        code: &str,
        filename: &str,
        filetype: &str,
    ) -> Result<Option<DiagnosticReport>, BridgeError> {
        let result = self
            .call(SandboxRequest::Run(RunParams {
                code: code.to_string(),
                filename: filename.to_string(),
                filetype: filetype.to_string(),
            }))
            .await?;

        if result.is_null() {
            return Ok(None);
        }
        let report: DiagnosticReport = serde_json::from_value(result)
            .map_err(|e| BridgeError::ProtocolError(format!("malformed run result: {e}")))?;
        Ok(Some(report))
    }
}
