use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use artifact_core::{ArtifactStore, EventBus, PreviewKind, SendBackToAi};
use artifact_preview::config::SANDBOX_CMD_ENV;
use artifact_preview::{
    ArtifactViewer, LoggingMetricsBackend, PreviewMetrics, SandboxKind, ViewerConfig,
    ViewerOptions,
};

use crate::Target;

/// Sandbox overrides from the command line. They win over the environment,
/// which wins over the config file.
pub struct SandboxChoice {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub stub: bool,
}

fn load_store(path: &Path) -> Result<ArtifactStore> {
    ArtifactStore::from_file(path)
        .with_context(|| format!("failed to load store {}", path.display()))
}

fn open_viewer(
    config: &ViewerConfig,
    store: &ArtifactStore,
    target: &Target,
    bus: Arc<EventBus>,
    metrics: Arc<PreviewMetrics>,
) -> Result<ArtifactViewer> {
    let mut options = ViewerOptions::from(&config.host);
    if let Some(store_id) = &target.store_id {
        options.store_id = store_id.clone();
    }
    let mut viewer = ArtifactViewer::new(options, store.reader(), bus, metrics);

    match (&target.group, &target.version) {
        (Some(group), Some(version)) => {
            viewer.select(group, version);
        }
        (Some(group), None) => {
            viewer.select_group(group);
        }
        _ => {}
    }

    if viewer.current_artifact().is_none() {
        bail!(
            "no artifact {} in store '{}'",
            viewer.cursor(),
            viewer.options().store_id
        );
    }
    Ok(viewer)
}

pub fn list(store_path: &Path, store_id: Option<&str>) -> Result<ExitCode> {
    let store = load_store(store_path)?;
    let reader = store.reader();
    let store_ids = match store_id {
        Some(id) => vec![id.to_string()],
        None => reader.store_ids(),
    };

    for id in store_ids {
        println!("{id}");
        for group in reader.groups(&id) {
            println!("  {}  {}  {}", group.id, group.filename, group.filetype);
            for version in &group.versions {
                let pending = if version.is_done { "" } else { "  (in progress)" };
                println!("    {}  #{}{pending}", version.id, version.version);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn show(config_path: Option<&Path>, target: &Target) -> Result<ExitCode> {
    let config = ViewerConfig::load(config_path)?;
    let store = load_store(&target.store)?;
    let viewer = open_viewer(
        &config,
        &store,
        target,
        Arc::new(EventBus::new(config.bus.capacity)),
        Arc::new(PreviewMetrics::new()),
    )?;

    let code = viewer.code().unwrap_or_default();
    print!("{code}");
    if !code.ends_with('\n') {
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

pub fn export(config_path: Option<&Path>, target: &Target, out: &Path) -> Result<ExitCode> {
    let config = ViewerConfig::load(config_path)?;
    let store = load_store(&target.store)?;
    let viewer = open_viewer(
        &config,
        &store,
        target,
        Arc::new(EventBus::new(config.bus.capacity)),
        Arc::new(PreviewMetrics::new()),
    )?;

    let path = viewer.export_to(out)?;
    println!("{}", path.display());
    Ok(ExitCode::SUCCESS)
}

/// Exit code 1 when the run ends in an error report.
pub async fn run(
    config_path: Option<&Path>,
    target: &Target,
    sandbox: SandboxChoice,
    send_back: bool,
) -> Result<ExitCode> {
    let mut config = ViewerConfig::load(config_path)?;
    if sandbox.stub {
        config.sandbox.kind = SandboxKind::Stub;
    }
    if !sandbox.args.is_empty() {
        config.sandbox.args = sandbox.args;
    }

    let store = load_store(&target.store)?;
    let bus = Arc::new(EventBus::new(config.bus.capacity));
    let mut events = bus.subscribe::<SendBackToAi>();
    let metrics = Arc::new(PreviewMetrics::with_backend(Arc::new(LoggingMetricsBackend)));
    let mut viewer = open_viewer(&config, &store, target, bus, Arc::clone(&metrics))?;

    if viewer.preview_kind() != Some(PreviewKind::Sandbox) {
        let filetype = viewer
            .current_artifact()
            .map(|v| v.filetype)
            .unwrap_or_default();
        println!(
            "{} has no live preview ({filetype}); use `show` to print its source",
            viewer.cursor()
        );
        return Ok(ExitCode::SUCCESS);
    }

    let command = sandbox
        .command
        .or_else(|| std::env::var(SANDBOX_CMD_ENV).ok());
    viewer.mount(config.build_bridge_with(command)?);
    let state = viewer.wait_settled().await;
    tracing::debug!(metrics = ?metrics.snapshot(), "Run finished");

    let Some(report) = state.report() else {
        println!("ok: {}", viewer.cursor());
        viewer.unmount();
        return Ok(ExitCode::SUCCESS);
    };

    println!("{}", report.format_for_send_back());
    if send_back {
        if viewer.send_back() {
            let event = events
                .try_recv()
                .context("send-back event was not delivered")?;
            println!("{}", serde_json::to_string_pretty(&event)?);
        } else {
            tracing::warn!("Send-back is not available for this report");
        }
    }
    viewer.unmount();
    Ok(ExitCode::FAILURE)
}
