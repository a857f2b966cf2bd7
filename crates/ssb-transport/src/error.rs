use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors from the secret-handshake and box-stream layers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The secret-handshake failed: a challenge, signature, or accept message
    /// did not match what was expected from the peer.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    /// The connection was closed, either by a clean box-stream termination
    /// record or by the peer dropping the socket.
    #[error("connection closed")]
    Closed,
    /// A box-stream frame was malformed: a bad header, an oversized segment,
    /// or a failed secretbox authentication.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ErrorCode for TransportError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "TRANSPORT_IO_ERROR",
            Self::HandshakeFailed(_) => "TRANSPORT_HANDSHAKE_FAILED",
            Self::Closed => "TRANSPORT_CLOSED",
            Self::Protocol(_) => "TRANSPORT_PROTOCOL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
