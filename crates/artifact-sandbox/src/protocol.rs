//! Wire format between the host and the sandbox.
//!
//! ```text
//! -> {"id":1,"method":"init"}
//! <- {"id":1,"result":true}
//! -> {"id":2,"method":"run","params":{"code":"...","filename":"index.html","filetype":"text/html"}}
//! <- {"id":2,"result":{"status":"error","errors":[...],"canSendBack":true}}
//! ```
//!
//! `error` in a response means the call itself failed; diagnostics about the
//! user's code travel in `result`.

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    Init,
    Run,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Method::Init => write!(f, "init"),
            Method::Run => write!(f, "run"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParams {
    pub code: String,
    pub filename: String,
    pub filetype: String,
}

/// A typed call into the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxRequest {
    Init,
    Run(RunParams),
}

impl SandboxRequest {
    pub fn method(&self) -> Method {
        match self {
            SandboxRequest::Init => Method::Init,
            SandboxRequest::Run(_) => Method::Run,
        }
    }

    pub fn into_envelope(self, id: u64) -> RequestEnvelope {
        let method = self.method();
        let params = match self {
            SandboxRequest::Init => None,
            SandboxRequest::Run(params) => Some(params),
        };
        RequestEnvelope { id, method, params }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    pub method: Method,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RunParams>,
}

impl TryFrom<RequestEnvelope> for SandboxRequest {
    type Error = BridgeError;

    fn try_from(envelope: RequestEnvelope) -> Result<Self, Self::Error> {
        match (envelope.method, envelope.params) {
            (Method::Init, _) => Ok(SandboxRequest::Init),
            (Method::Run, Some(params)) => Ok(SandboxRequest::Run(params)),
            (Method::Run, None) => Err(BridgeError::ProtocolError(format!(
                "request {} is missing run params",
                envelope.id
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(default)]
    pub result: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result,
            error: None,
        }
    }

    pub fn failed(id: u64, error: impl Into<String>) -> Self {
        Self {
            id,
            result: serde_json::Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Script-style truthiness: `null`, `false`, `0`, `""` are false.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
