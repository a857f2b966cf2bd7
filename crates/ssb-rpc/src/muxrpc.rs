//! Mux-rpc: dotted-method-name call/reply semantics layered on top of
//! [`crate::packet_stream`].
//!
//! This crate defines the request/reply shapes and the small set of call
//! kinds; the actual method table (which methods exist, and what invoking
//! each one does against the local store) lives in `ssb-session`, since
//! dispatch needs access to the log, tangles, and blob store that this crate
//! has no dependency on.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, RpcError};
use crate::packet_stream::PsBody;

/// The five mux-rpc call shapes named in a request body's `type` field.
/// `Sync` and `Async` are both single request/single reply and differ only
/// by convention on the server; they share the non-streaming wire behavior
/// here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Sync,
    Async,
    Source,
    Sink,
    Duplex,
}

/// A parsed incoming call: `{"name": [...], "args": [...], "type": "..."}`.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcRequest {
    pub name: Vec<String>,
    pub args: Value,
    #[serde(rename = "type")]
    pub call_type: CallType,
}

impl CallType {
    /// Whether this call shape carries multiple frames per reply.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Source | Self::Sink | Self::Duplex)
    }
}

impl RpcRequest {
    /// The dotted method name, e.g. `["blobs", "get"]` -> `"blobs.get"`.
    pub fn method(&self) -> String {
        self.name.join(".")
    }

    pub fn to_body(&self) -> Result<PsBody> {
        Ok(PsBody::Json(serde_json::to_value(self)?))
    }

    pub fn from_body(body: &PsBody) -> Result<Self> {
        let json = body
            .as_json()
            .ok_or_else(|| RpcError::MalformedPacket("call body is not JSON".into()))?;
        Ok(serde_json::from_value(json.clone())?)
    }
}

/// The `{"name": "Error", "message": "..."}` shape a peer sends instead of a
/// normal reply when a call fails or names an unknown method.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcErrorReply {
    pub name: String,
    pub message: String,
}

impl RpcErrorReply {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: "Error".to_string(),
            message: message.into(),
        }
    }

    pub fn to_body(&self) -> Result<PsBody> {
        Ok(PsBody::Json(serde_json::to_value(self)?))
    }
}

/// If `body` is JSON shaped like `{"name": "Error", ...}`, extracts it.
pub fn as_error_reply(body: &PsBody) -> Option<RpcErrorReply> {
    let json = body.as_json()?;
    if json.get("name")?.as_str()? != "Error" {
        return None;
    }
    serde_json::from_value(json.clone()).ok()
}
