use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("sandbox not ready after {attempts} attempts ({waited_ms}ms)")]
    HandshakeTimeout { attempts: u32, waited_ms: u64 },

    #[error("sandbox channel closed")]
    ChannelClosed,

    #[error("failed to start sandbox: {0}")]
    SpawnFailed(String),

    #[error("sandbox protocol error: {0}")]
    ProtocolError(String),

    #[error("sandbox call failed: {0}")]
    RemoteError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn is_handshake_timeout(&self) -> bool {
        matches!(self, BridgeError::HandshakeTimeout { .. })
    }
}
