//! The replication driver: connects a handshaked transport to the mux-rpc
//! method table and the become-client replication loop.
//!
//! [`driver::Session`] is the entry point the CLI front end uses for both
//! `port` (accept inbound connections) and `peer` (dial out): it drives one
//! connection from a completed handshake through to either a one-shot
//! backlog pull or an indefinitely live replication session.

pub mod connection;
pub mod dispatch;
pub mod driver;
pub mod error;
pub mod node;
pub mod prefetch;

pub use connection::Connection;
pub use driver::{Session, SyncMode};
pub use error::SessionError;
pub use node::Node;
pub use prefetch::prefetch_missing;
