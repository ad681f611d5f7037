use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, mpsc, oneshot};

use crate::error::BridgeError;
use crate::protocol::{RequestEnvelope, ResponseEnvelope};
use crate::transport::SandboxTransport;

type WriteAck = oneshot::Sender<std::io::Result<()>>;

struct ProcessIo {
    stdout: Lines<BufReader<ChildStdout>>,
    _child: Child,
}

/// Sandbox running in a separate OS process, spoken to with one JSON
/// envelope per line over stdin/stdout.
///
/// Requests are written by a dedicated task that owns stdin, so a caller
/// dropped mid-exchange never leaves half a line on the pipe.
///
/// The child's stderr is inherited so its logs land next to ours. The child
/// is killed when the transport is dropped.
pub struct ProcessTransport {
    io: Mutex<ProcessIo>,
    writer: mpsc::UnboundedSender<(String, WriteAck)>,
}

/// Write each queued line whole, then report back. Ends when the transport
/// is dropped or stdin breaks.
async fn write_lines(mut stdin: ChildStdin, mut queue: mpsc::UnboundedReceiver<(String, WriteAck)>) {
    while let Some((line, ack)) = queue.recv().await {
        let result = match stdin.write_all(line.as_bytes()).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        let failed = result.is_err();
        let _ = ack.send(result);
        if failed {
            tracing::debug!("Sandbox stdin closed, writer stopping");
            break;
        }
    }
}

impl ProcessTransport {
    pub fn spawn(program: &str, args: &[String]) -> Result<Self, BridgeError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BridgeError::SpawnFailed(format!("{program}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::SpawnFailed(format!("{program}: stdin not captured")))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::SpawnFailed(format!("{program}: stdout not captured")))?;

        tracing::info!(program, pid = ?child.id(), "Sandbox process started");

        let (writer, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_lines(stdin, queue));

        Ok(Self {
            io: Mutex::new(ProcessIo {
                stdout: BufReader::new(stdout).lines(),
                _child: child,
            }),
            writer,
        })
    }
}

fn closed_on_pipe(e: std::io::Error) -> BridgeError {
    match e.kind() {
        std::io::ErrorKind::BrokenPipe | std::io::ErrorKind::UnexpectedEof => {
            BridgeError::ChannelClosed
        }
        _ => BridgeError::IoError(e),
    }
}

impl SandboxTransport for ProcessTransport {
    fn exchange<'a>(
        &'a self,
        request: RequestEnvelope,
    ) -> Pin<Box<dyn Future<Output = Result<ResponseEnvelope, BridgeError>> + Send + 'a>> {
        Box::pin(async move {
            let mut line = serde_json::to_string(&request)?;
            line.push('\n');

            let mut io = self.io.lock().await;
            let (ack, written) = oneshot::channel();
            self.writer
                .send((line, ack))
                .map_err(|_| BridgeError::ChannelClosed)?;
            written
                .await
                .map_err(|_| BridgeError::ChannelClosed)?
                .map_err(closed_on_pipe)?;

            loop {
                let Some(line) = io.stdout.next_line().await.map_err(closed_on_pipe)? else {
                    return Err(BridgeError::ChannelClosed);
                };
                if line.trim().is_empty() {
                    continue;
                }
                let response: ResponseEnvelope = serde_json::from_str(&line).map_err(|e| {
                    BridgeError::ProtocolError(format!("invalid response line: {e}"))
                })?;
                if response.id == request.id {
                    return Ok(response);
                }
                // Reply to a call that was cancelled before it was answered.
                tracing::debug!(
                    expected = request.id,
                    got = response.id,
                    "Discarding stale sandbox response"
                );
            }
        })
    }
}
