//! Errors from running a connection: replication driver, mux-rpc dispatch,
//! and the handshake/session lifecycle around them.

use thiserror::Error;

use ssb_lfs::LfsError;
use ssb_rpc::RpcError;
use ssb_store::StoreError;
use ssb_tangle::TangleError;
use ssb_transport::TransportError;
use ssb_types::ErrorCode;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("tangle error: {0}")]
    Tangle(#[from] TangleError),
    #[error("lfs error: {0}")]
    Lfs(#[from] LfsError),
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("handshake timed out")]
    HandshakeTimeout,
    #[error("no such method: {0}")]
    NoSuchMethod(String),
    #[error("connection closed")]
    Closed,
}

impl ErrorCode for SessionError {
    fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "SESSION_TRANSPORT",
            Self::Rpc(_) => "SESSION_RPC",
            Self::Store(_) => "SESSION_STORE",
            Self::Tangle(_) => "SESSION_TANGLE",
            Self::Lfs(_) => "SESSION_LFS",
            Self::Json(_) => "SESSION_JSON",
            Self::Io(_) => "SESSION_IO",
            Self::HandshakeTimeout => "SESSION_HANDSHAKE_TIMEOUT",
            Self::NoSuchMethod(_) => "SESSION_NO_SUCH_METHOD",
            Self::Closed => "SESSION_CLOSED",
        }
    }
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
