use artifact_core::{ArtifactVersion, DiagnosticReport};

use crate::client::RemoteApi;
use crate::error::BridgeError;
use crate::handshake::{HandshakeConfig, await_ready};

/// A sandbox client plus the handshake policy used before every run.
pub struct Bridge {
    api: RemoteApi,
    handshake: HandshakeConfig,
}

impl Bridge {
    pub fn new(api: RemoteApi, handshake: HandshakeConfig) -> Self {
        Self { api, handshake }
    }

    pub fn api(&self) -> &RemoteApi {
        &self.api
    }

    pub fn handshake(&self) -> &HandshakeConfig {
        &self.handshake
    }

    /// Wait for the sandbox to accept runs.
    pub async fn ensure_ready(&self) -> Result<u32, BridgeError> {
        await_ready(&self.api, &self.handshake).await
    }

    /// Run a version, passing communication failures through.
    pub async fn try_run(
        &self,
        version: &ArtifactVersion,
    ) -> Result<Option<DiagnosticReport>, BridgeError> {
        self.api
            .run(&version.code, &version.filename, &version.filetype)
            .await
    }

    /// Run a version and always come back with a report.
    ///
    /// Communication failures become a single-diagnostic error report that
    /// may be sent back; a run with no report is `status = ok`.
    pub async fn run(&self, version: &ArtifactVersion) -> DiagnosticReport {
        match self.try_run(version).await {
            Ok(Some(report)) => report,
            Ok(None) => DiagnosticReport::ok(),
            Err(e) => {
                tracing::warn!(
                    group_id = %version.group_id,
                    version_id = %version.id,
                    error = %e,
                    "Sandbox run failed"
                );
                DiagnosticReport::from_failure(e.to_string())
            }
        }
    }

    /// Handshake, then run. Only a handshake timeout is an `Err`.
    pub async fn execute(&self, version: &ArtifactVersion) -> Result<DiagnosticReport, BridgeError> {
        self.ensure_ready().await?;
        Ok(self.run(version).await)
    }
}
