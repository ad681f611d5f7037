//! A viewer session end to end: host-shaped store JSON, an in-process
//! sandbox that "compiles" by looking for a dangling paren, and a
//! send-back consumer listening on the bus.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use artifact_core::{
    ArtifactGroup, ArtifactStore, ArtifactVersion, Diagnostic, DiagnosticReport, EventBus, Label,
    ReportStatus, SendBackToAi, Severity, StoreError,
};
use artifact_preview::{ArtifactViewer, PreviewMetrics, PreviewState, ViewerOptions};
use artifact_sandbox::{Bridge, HandshakeConfig, RunParams, SandboxHandler, attach, channel};

const STORE_JSON: &str = r#"{
  "artifacts": {
    "chat-1": [
      {
        "id": "react-component",
        "filename": "Counter.tsx",
        "filetype": "application/vnd.ant.react",
        "versions": [
          {"group_id": "react-component", "id": "v1", "version": 1, "filename": "Counter.tsx",
           "filetype": "application/vnd.ant.react", "code": "export default (", "is_done": true},
          {"group_id": "react-component", "id": "v2", "version": 2, "filename": "Counter.tsx",
           "filetype": "application/vnd.ant.react", "code": "export default () => null", "is_done": true}
        ]
      }
    ],
    "chat-2": [
      {
        "id": "html-page",
        "filename": "index.html",
        "filetype": "application/vnd.ant.html",
        "versions": [
          {"group_id": "html-page", "id": "v1", "version": 1, "filename": "index.html",
           "filetype": "application/vnd.ant.html", "code": "<html></html>", "is_done": true}
        ]
      }
    ]
  }
}"#;

/// Fails code ending in `(`; slow code takes a while before succeeding.
/// Becomes ready on the third probe.
struct ParenSandbox {
    probes: std::sync::atomic::AtomicU32,
}

impl ParenSandbox {
    fn new() -> Self {
        Self {
            probes: std::sync::atomic::AtomicU32::new(0),
        }
    }
}

impl SandboxHandler for ParenSandbox {
    fn init<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<bool, String>> + Send + 'a>> {
        Box::pin(async move {
            let seen = self
                .probes
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(seen >= 2)
        })
    }

    fn run<'a>(
        &'a self,
        params: &'a RunParams,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DiagnosticReport>, String>> + Send + 'a>> {
        Box::pin(async move {
            if params.code.contains("slow") {
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
            if !params.code.trim_end().ends_with('(') {
                return Ok(None);
            }
            let end = params.code.len();
            Ok(Some(DiagnosticReport {
                status: ReportStatus::Error,
                errors: vec![Diagnostic {
                    severity: Severity::Error,
                    message: "Unexpected token".into(),
                    labels: vec![Label {
                        message: "here".into(),
                        start: end - 1,
                        end,
                    }],
                    codeframe: format!("> 1 | {}", params.code),
                }],
                can_send_back: true,
            }))
        })
    }
}

fn mounted(store: &ArtifactStore, options: ViewerOptions, bus: Arc<EventBus>) -> ArtifactViewer {
    let (transport, port) = channel(8);
    port.spawn(ParenSandbox::new());
    let config = HandshakeConfig {
        max_attempts: 10,
        interval: Duration::from_millis(20),
        deadline: Some(Duration::from_secs(5)),
    };
    let mut viewer =
        ArtifactViewer::new(options, store.reader(), bus, Arc::new(PreviewMetrics::new()));
    viewer.mount(Bridge::new(attach(transport), config));
    viewer
}

fn options(store_id: &str, group_id: &str, version_id: &str) -> ViewerOptions {
    ViewerOptions::from_attributes([
        ("store-id", store_id),
        ("group-id", group_id),
        ("version-id", version_id),
    ])
}

#[tokio::test(start_paused = true)]
async fn failing_version_is_sent_back_then_fixed() {
    let store = ArtifactStore::from_json(STORE_JSON).unwrap();
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe::<SendBackToAi>();

    let consumer = tokio::spawn(async move { events.recv().await.unwrap() });

    let mut viewer = mounted(&store, options("chat-1", "react-component", "v1"), Arc::clone(&bus));
    let state = viewer.wait_settled().await;
    let report = state.report().expect("error report");
    assert_eq!(report.errors[0].labels[0].start, 15);
    assert!(viewer.send_back());

    let event = consumer.await.unwrap();
    assert_eq!(event.store_id, "chat-1");
    assert_eq!(event.version_id, "v1");
    assert_eq!(event.file, "export default (");
    assert!(event.error.starts_with("1. Error: Unexpected token\n   • here (position: 15-16)"));

    // Moving to the latest version picks up the fix.
    assert!(viewer.select_group("react-component"));
    assert_eq!(viewer.wait_settled().await, PreviewState::Ready(None));
    assert!(!viewer.can_send_back());
}

#[tokio::test(start_paused = true)]
async fn stores_are_independent() {
    let store = ArtifactStore::from_json(STORE_JSON).unwrap();
    let bus = Arc::new(EventBus::default());

    let html = mounted(&store, options("chat-2", "html-page", "v1"), Arc::clone(&bus));
    let react = mounted(&store, options("chat-2", "react-component", "v1"), Arc::clone(&bus));

    assert_eq!(html.wait_settled().await, PreviewState::Ready(None));
    assert!(html.current_artifact().is_some());
    // react-component lives in chat-1 only.
    assert!(react.current_artifact().is_none());
    assert_eq!(react.state(), PreviewState::Idle);
}

#[tokio::test(start_paused = true)]
async fn pushed_version_replaces_stale_slow_run() {
    let store = ArtifactStore::from_json(STORE_JSON).unwrap();
    store
        .push_version(
            "chat-1",
            ArtifactVersion::new(
                "react-component",
                "v3",
                3,
                "Counter.tsx",
                "application/vnd.ant.react",
                "/* slow */ export default (",
            ),
        )
        .unwrap();
    store
        .push_version(
            "chat-1",
            ArtifactVersion::new(
                "react-component",
                "v4",
                4,
                "Counter.tsx",
                "application/vnd.ant.react",
                "export default () => 4",
            ),
        )
        .unwrap();

    let bus = Arc::new(EventBus::default());
    let mut viewer = mounted(&store, options("chat-1", "react-component", "v3"), bus);
    assert!(viewer.is_loading());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(viewer.select("react-component", "v4"));

    assert_eq!(viewer.wait_settled().await, PreviewState::Ready(None));
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(viewer.state(), PreviewState::Ready(None));

    let metrics = viewer.controller().metrics().snapshot();
    assert_eq!(metrics.runs_started, 2);
    assert_eq!(metrics.runs_cancelled, 1);
    assert_eq!(metrics.runs_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn viewer_follows_host_writes_and_sends_back_what_ran() {
    let store = ArtifactStore::new();
    let bus = Arc::new(EventBus::default());
    let mut events = bus.subscribe::<SendBackToAi>();
    let mut viewer = mounted(&store, options("chat-1", "react-component", "v1"), Arc::clone(&bus));
    assert_eq!(viewer.state(), PreviewState::Idle);

    let seed = ArtifactStore::from_json(STORE_JSON).unwrap();
    let group = seed.reader().group("chat-1", "react-component").unwrap();
    store.insert_group("chat-1", group).unwrap();

    assert!(viewer.store_changed().await);
    let state = viewer.wait_settled().await;
    assert!(state.report().is_some());
    assert_eq!(viewer.controller().metrics().snapshot().runs_started, 1);

    // v1 already exists; a rewrite under the same id is refused.
    let rewrite = ArtifactGroup::from_versions(vec![ArtifactVersion::new(
        "react-component",
        "v1",
        1,
        "Counter.tsx",
        "application/vnd.ant.react",
        "export default () => 1",
    )])
    .unwrap();
    assert!(matches!(
        store.insert_group("chat-1", rewrite),
        Err(StoreError::VersionConflict { .. })
    ));
    assert!(!viewer.sync_with_store());

    assert!(viewer.send_back());
    let event = events.try_recv().unwrap();
    assert_eq!(event.version_id, "v1");
    assert_eq!(event.file, "export default (");
}
