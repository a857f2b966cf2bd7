//! The persistent substrate: a content-addressed blob store and a framed,
//! indexed, append-only log of signed messages.
//!
//! [`store::LogStore`] is the single entry point higher layers (`ssb-tangle`,
//! `ssb-lfs`, `ssb-session`) use to read and append log entries; [`blobs::BlobStore`]
//! is the equivalent for file content. Neither crate knows about the wire
//! protocol or the tangle/LFS data model layered on top.

pub mod blobs;
pub mod error;
pub mod friends;
pub mod index;
pub mod last;
pub mod lock;
pub mod log;
pub mod store;

pub use blobs::BlobStore;
pub use error::StoreError;
pub use store::{LocalAppendHook, LogStore};
