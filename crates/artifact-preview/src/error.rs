use thiserror::Error;

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("no artifact is selected")]
    NoCurrentArtifact,

    #[error("refusing to export to {0:?}: not a plain file name")]
    InvalidFilename(String),

    #[error("sandbox error: {0}")]
    SandboxError(#[from] artifact_sandbox::BridgeError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
