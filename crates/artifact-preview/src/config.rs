use std::path::{Path, PathBuf};
use std::time::Duration;

use artifact_sandbox::{Bridge, HandshakeConfig, ProcessTransport, StubSandbox, attach, channel};
use serde::Deserialize;

use crate::error::PreviewError;

pub const SANDBOX_CMD_ENV: &str = "ARTIFACT_SANDBOX_CMD";

#[derive(Debug, Default, Deserialize)]
pub struct ViewerConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub bus: BusConfig,
}

/// Defaults for the embedding attributes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HostConfig {
    #[serde(default = "default_store_id")]
    pub store_id: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
    #[serde(default = "default_version_id")]
    pub version_id: String,
    #[serde(default)]
    pub can_send_back: bool,
    #[serde(default = "default_src")]
    pub src: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            store_id: default_store_id(),
            group_id: default_group_id(),
            version_id: default_version_id(),
            can_send_back: false,
            src: default_src(),
        }
    }
}

pub(crate) fn default_store_id() -> String {
    "default".into()
}
pub(crate) fn default_group_id() -> String {
    "react-component".into()
}
pub(crate) fn default_version_id() -> String {
    "v1".into()
}
pub(crate) fn default_src() -> String {
    "https://langgraph-artifacts.netlify.app/index.html".into()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum SandboxKind {
    #[default]
    #[serde(rename = "process")]
    Process,
    #[serde(rename = "stub")]
    Stub,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SandboxConfig {
    #[serde(default)]
    pub kind: SandboxKind,
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    pub deadline_ms: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            kind: SandboxKind::default(),
            command: None,
            args: Vec::new(),
            max_attempts: default_max_attempts(),
            interval_ms: default_interval_ms(),
            deadline_ms: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    100
}
fn default_interval_ms() -> u64 {
    100
}

impl SandboxConfig {
    pub fn handshake(&self) -> HandshakeConfig {
        HandshakeConfig {
            max_attempts: self.max_attempts,
            interval: Duration::from_millis(self.interval_ms),
            deadline: self.deadline_ms.map(Duration::from_millis),
        }
    }

    /// The sandbox command, with `env_override` taking precedence over the
    /// configured one. Blank values count as unset.
    pub fn command_with_override(&self, env_override: Option<String>) -> Option<String> {
        env_override
            .filter(|cmd| !cmd.trim().is_empty())
            .or_else(|| self.command.clone())
            .filter(|cmd| !cmd.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

fn default_bus_capacity() -> usize {
    64
}

impl ViewerConfig {
    pub fn from_file(path: &Path) -> Result<Self, PreviewError> {
        let content = std::fs::read_to_string(path).map_err(PreviewError::IoError)?;
        toml::from_str(&content)
            .map_err(|e| PreviewError::ConfigError(format!("Failed to parse config: {e}")))
    }

    /// `~/.artifact-viewer/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".artifact-viewer").join("config.toml"))
    }

    /// Load an explicit config file, or the default one if it exists, or
    /// fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, PreviewError> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                tracing::debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Start the configured sandbox and wrap it in a [`Bridge`]. The
    /// `ARTIFACT_SANDBOX_CMD` environment variable overrides the configured
    /// command.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn build_bridge(&self) -> Result<Bridge, PreviewError> {
        self.build_bridge_with(std::env::var(SANDBOX_CMD_ENV).ok())
    }

    pub fn build_bridge_with(&self, command_override: Option<String>) -> Result<Bridge, PreviewError> {
        let handshake = self.sandbox.handshake();
        match self.sandbox.kind {
            SandboxKind::Process => {
                let command = self
                    .sandbox
                    .command_with_override(command_override)
                    .ok_or_else(|| {
                        PreviewError::ConfigError(format!(
                            "no sandbox command configured; set sandbox.command or {SANDBOX_CMD_ENV}"
                        ))
                    })?;
                tracing::info!(%command, args = ?self.sandbox.args, "Starting process sandbox");
                let transport = ProcessTransport::spawn(&command, &self.sandbox.args)?;
                Ok(Bridge::new(attach(transport), handshake))
            }
            SandboxKind::Stub => {
                tracing::info!("Using in-process stub sandbox");
                let (transport, port) = channel(16);
                port.spawn(StubSandbox::ok());
                Ok(Bridge::new(attach(transport), handshake))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ViewerConfig = toml::from_str("").unwrap();
        assert_eq!(config.host, HostConfig::default());
        assert_eq!(config.host.group_id, "react-component");
        assert!(!config.host.can_send_back);
        assert_eq!(config.sandbox.kind, SandboxKind::Process);
        assert_eq!(config.sandbox.handshake(), HandshakeConfig::default());
        assert_eq!(config.bus.capacity, 64);
    }

    #[test]
    fn parses_full_config() {
        let toml_str = r#"
[host]
store_id = "chat-42"
group_id = "html-page"
version_id = "v3"
can_send_back = true

[sandbox]
kind = "process"
command = "node"
args = ["sandbox.js"]
max_attempts = 20
interval_ms = 50
deadline_ms = 3000

[bus]
capacity = 8
"#;
        let config: ViewerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host.store_id, "chat-42");
        assert!(config.host.can_send_back);
        assert_eq!(config.host.src, default_src());
        assert_eq!(config.sandbox.command.as_deref(), Some("node"));
        assert_eq!(config.sandbox.args, vec!["sandbox.js".to_string()]);

        let handshake = config.sandbox.handshake();
        assert_eq!(handshake.max_attempts, 20);
        assert_eq!(handshake.interval, Duration::from_millis(50));
        assert_eq!(handshake.deadline(), Duration::from_secs(3));
        assert_eq!(config.bus.capacity, 8);
    }

    #[test]
    fn demo_config_parses() {
        let config: ViewerConfig = toml::from_str(include_str!("../../../demos/config.toml")).unwrap();
        assert_eq!(config.sandbox.command.as_deref(), Some("artifact-viewer"));
        assert_eq!(config.sandbox.args[0], "serve-stub");
        assert_eq!(config.host.version_id, "v2");
    }

    #[test]
    fn parses_stub_kind() {
        let config: ViewerConfig = toml::from_str("[sandbox]\nkind = \"stub\"\n").unwrap();
        assert_eq!(config.sandbox.kind, SandboxKind::Stub);
    }

    #[test]
    fn env_override_wins_over_config() {
        let sandbox = SandboxConfig {
            command: Some("node".into()),
            ..SandboxConfig::default()
        };
        assert_eq!(
            sandbox.command_with_override(Some("deno".into())).as_deref(),
            Some("deno")
        );
        assert_eq!(sandbox.command_with_override(Some("  ".into())).as_deref(), Some("node"));
        assert_eq!(sandbox.command_with_override(None).as_deref(), Some("node"));
        assert_eq!(SandboxConfig::default().command_with_override(None), None);
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[host]\nstore_id = \"from-file\"").unwrap();
        let config = ViewerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.host.store_id, "from-file");
    }

    #[test]
    fn malformed_file_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[sandbox]\nmax_attempts = \"lots\"").unwrap();
        let err = ViewerConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, PreviewError::ConfigError(_)));
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ViewerConfig::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, PreviewError::IoError(_)));
    }

    #[tokio::test]
    async fn process_kind_without_command_is_config_error() {
        let config = ViewerConfig::default();
        let err = config.build_bridge_with(None).err().unwrap();
        assert!(matches!(err, PreviewError::ConfigError(_)));
    }

    #[tokio::test]
    async fn stub_kind_builds_a_ready_bridge() {
        let config: ViewerConfig = toml::from_str("[sandbox]\nkind = \"stub\"\n").unwrap();
        let bridge = config.build_bridge().unwrap();
        assert_eq!(bridge.ensure_ready().await.unwrap(), 1);
    }
}
