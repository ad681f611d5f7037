//! Shared model for the artifact viewer.
//!
//! Holds the versioned artifact store, the structured diagnostics that a
//! sandboxed run produces, and the publish/subscribe bus used to hand a
//! failed run back to whoever generated the code.
//!
//! # Quick start
//!
//! ```rust
//! use artifact_core::{ArtifactGroup, ArtifactStore, ArtifactVersion, Selection};
//!
//! let store = ArtifactStore::new();
//! let v1 = ArtifactVersion::new("html-page", "v1", 1, "index.html", "application/vnd.ant.html", "<html></html>");
//! store.insert_group("default", ArtifactGroup::from_versions(vec![v1]).unwrap()).unwrap();
//!
//! let reader = store.reader();
//! let current = reader.resolve("default", &Selection::new("html-page", "v1"));
//! assert!(current.is_some());
//! ```

pub mod bus;
pub mod diagnostic;
pub mod error;
pub mod filetype;
pub mod store;
pub mod types;

pub use bus::{EventBus, SendBackPayload, SendBackToAi, Topic};
pub use diagnostic::{Diagnostic, DiagnosticReport, Label, ReportStatus, Severity};
pub use error::StoreError;
pub use filetype::PreviewKind;
pub use store::{ArtifactStore, StoreReader};
pub use types::{ArtifactGroup, ArtifactVersion, Selection};
