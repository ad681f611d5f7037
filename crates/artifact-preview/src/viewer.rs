use std::path::{Path, PathBuf};
use std::sync::Arc;

use artifact_core::filetype::{language_for, preview_kind};
use artifact_core::{
    ArtifactGroup, ArtifactVersion, DiagnosticReport, EventBus, PreviewKind, Selection,
    SendBackPayload, SendBackToAi, StoreReader,
};
use artifact_sandbox::Bridge;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{self, HostConfig};
use crate::controller::{PreviewController, PreviewState};
use crate::error::PreviewError;
use crate::metrics::PreviewMetrics;

/// Host embedding attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerOptions {
    pub store_id: String,
    pub group_id: String,
    pub version_id: String,
    pub can_send_back: bool,
    pub src: String,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            store_id: config::default_store_id(),
            group_id: config::default_group_id(),
            version_id: config::default_version_id(),
            can_send_back: false,
            src: config::default_src(),
        }
    }
}

impl From<&HostConfig> for ViewerOptions {
    fn from(host: &HostConfig) -> Self {
        Self {
            store_id: host.store_id.clone(),
            group_id: host.group_id.clone(),
            version_id: host.version_id.clone(),
            can_send_back: host.can_send_back,
            src: host.src.clone(),
        }
    }
}

impl ViewerOptions {
    /// Build options from string attributes (`store-id`, `group-id`,
    /// `version-id`, `can-send-back`, `src`). Missing attributes keep their
    /// defaults; unknown ones are ignored.
    pub fn from_attributes<'a>(attrs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut options = Self::default();
        for (name, value) in attrs {
            options.set_attribute(name, value);
        }
        options
    }

    /// Apply one attribute change. Returns false for unknown names.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> bool {
        match name {
            "store-id" => self.store_id = value.to_string(),
            "group-id" => self.group_id = value.to_string(),
            "version-id" => self.version_id = value.to_string(),
            "can-send-back" => self.can_send_back = value.trim().eq_ignore_ascii_case("true"),
            "src" => self.src = value.to_string(),
            other => {
                tracing::debug!(attribute = other, "Ignoring unknown attribute");
                return false;
            }
        }
        true
    }

    pub fn selection(&self) -> Selection {
        Selection::new(&self.group_id, &self.version_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Preview,
    Source,
}

/// One mounted viewer: a selection cursor over a read-only store, the
/// preview controller that owns the sandbox, and the send-back path.
pub struct ArtifactViewer {
    options: ViewerOptions,
    store: StoreReader,
    bus: Arc<EventBus>,
    controller: PreviewController,
    cursor: Selection,
    view_mode: ViewMode,
    store_changes: watch::Receiver<u64>,
    /// What the cursor resolved to at the last refresh.
    resolved: Option<ArtifactVersion>,
}

impl ArtifactViewer {
    pub fn new(
        options: ViewerOptions,
        store: StoreReader,
        bus: Arc<EventBus>,
        metrics: Arc<PreviewMetrics>,
    ) -> Self {
        let cursor = options.selection();
        let store_changes = store.changed();
        Self {
            options,
            store,
            bus,
            controller: PreviewController::new(metrics),
            cursor,
            view_mode: ViewMode::default(),
            store_changes,
            resolved: None,
        }
    }

    /// Hand the viewer its sandbox and run the current artifact.
    pub fn mount(&mut self, bridge: Bridge) -> Option<u64> {
        self.controller.attach(bridge);
        tracing::debug!(store_id = %self.options.store_id, cursor = %self.cursor, "Viewer mounted");
        self.refresh()
    }

    /// Release the sandbox. In-flight work is cancelled and its result
    /// dropped.
    pub fn unmount(&mut self) {
        self.controller.detach();
        self.controller.reset();
        tracing::debug!(store_id = %self.options.store_id, "Viewer unmounted");
    }

    pub fn options(&self) -> &ViewerOptions {
        &self.options
    }

    pub fn cursor(&self) -> &Selection {
        &self.cursor
    }

    pub fn controller(&self) -> &PreviewController {
        &self.controller
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// The version under the cursor; a stale cursor is `None`.
    pub fn current_artifact(&self) -> Option<ArtifactVersion> {
        self.store.resolve(&self.options.store_id, &self.cursor)
    }

    /// Groups of this viewer's store, for the file picker.
    pub fn groups(&self) -> Vec<ArtifactGroup> {
        self.store.groups(&self.options.store_id)
    }

    /// Versions of the current group, for the version picker.
    pub fn versions(&self) -> Vec<ArtifactVersion> {
        self.store
            .group(&self.options.store_id, &self.cursor.group_id)
            .map(|g| g.versions)
            .unwrap_or_default()
    }

    /// Replace the host attributes. The cursor follows the host selection.
    pub fn update_options(&mut self, options: ViewerOptions) -> bool {
        let store_changed = options.store_id != self.options.store_id;
        let target = options.selection();
        self.options = options;
        if store_changed {
            self.cursor = target;
            self.refresh();
            return true;
        }
        self.move_cursor(target)
    }

    pub fn set_host_selection(&mut self, group_id: &str, version_id: &str) -> bool {
        self.options.group_id = group_id.to_string();
        self.options.version_id = version_id.to_string();
        self.move_cursor(self.options.selection())
    }

    /// Point the cursor at `(group_id, version_id)`. Returns whether the
    /// target changed; a change re-runs the preview.
    pub fn select(&mut self, group_id: &str, version_id: &str) -> bool {
        self.move_cursor(Selection::new(group_id, version_id))
    }

    /// Select the latest version of a group.
    pub fn select_group(&mut self, group_id: &str) -> bool {
        match self.store.latest_version(&self.options.store_id, group_id) {
            Some(latest) => self.move_cursor(latest.selection()),
            None => {
                tracing::debug!(group_id, "No such group");
                false
            }
        }
    }

    /// Select version number `version` within the current group.
    pub fn select_version_number(&mut self, version: u32) -> bool {
        let found =
            self.store
                .version_by_number(&self.options.store_id, &self.cursor.group_id, version);
        match found {
            Some(v) => self.move_cursor(v.selection()),
            None => {
                tracing::debug!(group_id = %self.cursor.group_id, version, "No such version");
                false
            }
        }
    }

    fn move_cursor(&mut self, target: Selection) -> bool {
        if target == self.cursor {
            return false;
        }
        tracing::debug!(from = %self.cursor, to = %target, "Selection changed");
        self.cursor = target;
        self.refresh();
        true
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        if mode == self.view_mode {
            return;
        }
        self.view_mode = mode;
        self.refresh();
    }

    pub fn preview_kind(&self) -> Option<PreviewKind> {
        self.current_artifact().map(|v| preview_kind(&v.filetype))
    }

    pub fn language(&self) -> Option<&'static str> {
        self.current_artifact()
            .and_then(|v| language_for(&v.filetype, &v.filename))
    }

    /// Text for the copy action.
    pub fn code(&self) -> Option<String> {
        self.current_artifact().map(|v| v.code)
    }

    /// Re-run the current artifact if it is previewable. Otherwise any
    /// in-flight run is cancelled and the preview goes idle.
    pub fn refresh(&mut self) -> Option<u64> {
        let current = self.current_artifact();
        self.resolved = current.clone();
        let runnable = self.view_mode == ViewMode::Preview
            && current
                .as_ref()
                .is_some_and(|v| preview_kind(&v.filetype) == PreviewKind::Sandbox);
        if !runnable {
            self.controller.reset();
            return None;
        }
        self.controller.run(current.as_ref())
    }

    /// Re-resolve the cursor after host writes and refresh if it now
    /// points at something different from the last refresh. Returns
    /// whether a refresh happened.
    pub fn sync_with_store(&mut self) -> bool {
        let _ = self.store_changes.borrow_and_update();
        let current = self.current_artifact();
        let unchanged = match (&current, &self.resolved) {
            (Some(now), Some(before)) => now.same_content(before),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return false;
        }
        tracing::debug!(
            store_id = %self.options.store_id,
            cursor = %self.cursor,
            revision = self.store.revision(),
            "Store changed under cursor"
        );
        self.refresh();
        true
    }

    /// Wait for the next host write to the store, then
    /// [`sync_with_store`](Self::sync_with_store).
    pub async fn store_changed(&mut self) -> bool {
        if self.store_changes.changed().await.is_err() {
            return false;
        }
        self.sync_with_store()
    }

    pub fn state(&self) -> PreviewState {
        self.controller.state()
    }

    pub fn is_loading(&self) -> bool {
        self.controller.is_loading()
    }

    pub fn report(&self) -> Option<DiagnosticReport> {
        self.controller.report()
    }

    pub async fn wait_settled(&self) -> PreviewState {
        self.controller.wait_settled().await
    }

    pub fn dismiss_error(&self) -> bool {
        self.controller.dismiss()
    }

    /// Send-back is offered for error reports that allow it, or when the
    /// host opts in for every error.
    pub fn can_send_back(&self) -> bool {
        self.report()
            .is_some_and(|r| r.is_error() && (r.can_send_back || self.options.can_send_back))
    }

    /// Publish the current error on the bus, with the code of the version
    /// that produced it. Returns false when the action is not available.
    /// Delivery is fire-and-forget.
    pub fn send_back(&self) -> bool {
        if !self.can_send_back() {
            return false;
        }
        let Some((report, version)) = self.controller.reported_run() else {
            return false;
        };
        let target = version.selection();
        let payload = SendBackPayload {
            store_id: self.options.store_id.clone(),
            group_id: version.group_id,
            version_id: version.id,
            file: version.code,
            error: report.format_for_send_back(),
        };
        let receivers = self.bus.publish::<SendBackToAi>(payload);
        self.controller.metrics().record_send_back();
        tracing::info!(
            store_id = %self.options.store_id,
            %target,
            receivers,
            "Error sent back"
        );
        true
    }

    /// Write the current version's code to `<dir>/<filename>`.
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf, PreviewError> {
        let version = self
            .current_artifact()
            .ok_or(PreviewError::NoCurrentArtifact)?;
        let name = Path::new(&version.filename);
        let plain = name.file_name().is_some_and(|f| f == name.as_os_str());
        if !plain {
            return Err(PreviewError::InvalidFilename(version.filename));
        }
        std::fs::create_dir_all(dir)?;
        let path = dir.join(name);
        std::fs::write(&path, &version.code)?;
        tracing::info!(path = %path.display(), target = %self.cursor, "Artifact exported");
        Ok(path)
    }
}
