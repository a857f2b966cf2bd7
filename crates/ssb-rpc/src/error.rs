use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors from packet-stream framing and mux-rpc dispatch.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The underlying box-stream transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] ssb_transport::TransportError),
    /// A packet-stream header or body failed to parse.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
    /// A JSON-typed packet body failed to (de)serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The peer replied with a mux-rpc `{name: "Error", ...}` message.
    #[error("remote error: {0}")]
    Remote(String),
    /// No handler is registered for the dotted method name called.
    #[error("no such method: {0}")]
    NoSuchMethod(String),
    /// The connection was closed while a call was still pending.
    #[error("connection closed")]
    Closed,
}

impl ErrorCode for RpcError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "RPC_TRANSPORT_ERROR",
            Self::MalformedPacket(_) => "RPC_MALFORMED_PACKET",
            Self::Json(_) => "RPC_JSON_ERROR",
            Self::Remote(_) => "RPC_REMOTE_ERROR",
            Self::NoSuchMethod(_) => "RPC_NO_SUCH_METHOD",
            Self::Closed => "RPC_CLOSED",
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
