//! Core data structures and error types for the ssb-drive system.
//!
//! This crate has no cryptographic or I/O dependencies; it defines the wire
//! shapes (`Identity`, `MessageId`, `BlobId`, `SignedMessage`) and the
//! canonical-JSON encoder that every signature in the system is computed
//! over. Downstream crates (`ssb-crypto`, `ssb-store`, ...) build on these
//! types rather than redefining them.

pub mod canonical;
pub mod error;
pub mod ids;
pub mod message;

pub use error::{CoreError, ErrorCode};
pub use ids::{BlobId, Identity, MessageId};
pub use message::SignedMessage;

/// Convenience result alias used across the workspace's library crates.
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
