use anyhow::Result;
use artifact_core::DiagnosticReport;
use artifact_sandbox::{RequestEnvelope, StubSandbox, dispatch};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Serve the sandbox line protocol on stdin/stdout until stdin closes.
pub async fn serve(ready_after: u32, error: Option<String>) -> Result<std::process::ExitCode> {
    let sandbox = match error {
        Some(message) => StubSandbox::constant(DiagnosticReport::from_failure(message)),
        None => StubSandbox::ok(),
    }
    .ready_after(ready_after);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    tracing::info!(ready_after, "Stub sandbox serving on stdio");

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let envelope: RequestEnvelope = match serde_json::from_str(&line) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed request");
                continue;
            }
        };
        let response = dispatch(&sandbox, envelope).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    tracing::info!(runs = sandbox.run_count(), "Stub sandbox stdin closed");
    Ok(std::process::ExitCode::SUCCESS)
}
