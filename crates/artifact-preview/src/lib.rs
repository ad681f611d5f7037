//! Preview side of the artifact viewer.
//!
//! [`PreviewController`] decides when code runs in the sandbox and tracks
//! the `Idle -> Loading -> Ready(report?)` lifecycle. [`ArtifactViewer`]
//! layers the selection cursor, view mode, send-back and export actions on
//! top of it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use artifact_core::{ArtifactStore, EventBus};
//! use artifact_preview::{ArtifactViewer, PreviewMetrics, ViewerConfig, ViewerOptions};
//!
//! # async fn run() -> Result<(), artifact_preview::PreviewError> {
//! let config = ViewerConfig::load(None)?;
//! let store = ArtifactStore::from_file("store.json".as_ref()).expect("store");
//!
//! let mut viewer = ArtifactViewer::new(
//!     ViewerOptions::from(&config.host),
//!     store.reader(),
//!     Arc::new(EventBus::new(config.bus.capacity)),
//!     Arc::new(PreviewMetrics::new()),
//! );
//! viewer.mount(config.build_bridge()?);
//!
//! if let Some(report) = viewer.wait_settled().await.report() {
//!     println!("{}", report.format_for_send_back());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod metrics;
pub mod viewer;

pub use config::{BusConfig, HostConfig, SandboxConfig, SandboxKind, ViewerConfig};
pub use controller::{PreviewController, PreviewState};
pub use error::PreviewError;
pub use metrics::{LoggingMetricsBackend, MetricsBackend, MetricsSnapshot, PreviewMetrics};
pub use viewer::{ArtifactViewer, ViewMode, ViewerOptions};
