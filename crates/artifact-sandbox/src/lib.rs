//! Remote execution bridge for the artifact viewer.
//!
//! Untrusted code never runs in the host's context. It is shipped to an
//! isolated sandbox over a message channel, which answers two calls:
//! `init` (am I ready?) and `run` (execute this and report diagnostics).
//!
//! [`RemoteApi`] is the typed RPC client over any [`SandboxTransport`];
//! [`Bridge`] adds the readiness handshake and folds communication failures
//! into a [`DiagnosticReport`](artifact_core::DiagnosticReport).
//!
//! # Quick start
//!
//! ```rust,no_run
//! use artifact_core::ArtifactVersion;
//! use artifact_sandbox::{attach, Bridge, HandshakeConfig, ProcessTransport};
//!
//! # async fn run() -> Result<(), artifact_sandbox::BridgeError> {
//! let transport = ProcessTransport::spawn("artifact-sandbox-node", &[])?;
//! let bridge = Bridge::new(attach(transport), HandshakeConfig::default());
//!
//! let version = ArtifactVersion::new("html-page", "v1", 1, "index.html", "text/html", "<html></html>");
//! let report = bridge.execute(&version).await?;
//! assert!(!report.is_error());
//! # Ok(())
//! # }
//! ```

pub mod bridge;
pub mod client;
pub mod error;
pub mod handshake;
pub mod process;
pub mod protocol;
pub mod transport;

pub use bridge::Bridge;
pub use client::{RemoteApi, attach};
pub use error::BridgeError;
pub use handshake::{HandshakeConfig, await_ready};
pub use process::ProcessTransport;
pub use protocol::{RequestEnvelope, ResponseEnvelope, RunParams, SandboxRequest};
pub use transport::{
    ChannelTransport, SandboxHandler, SandboxPort, SandboxTransport, StubSandbox, channel, dispatch,
};
