//! The tangle CRDT: a partially-ordered DAG of log messages sharing a
//! common `base`, with tip discovery, deterministic iteration, and append.
//!
//! Built directly on [`ssb_store::LogStore`]; knows nothing about
//! directories or blobs (that's `ssb-lfs`, one layer up).

pub mod content;
pub mod error;
pub mod tangle;

pub use content::{TangleEntryContent, TangleRef, TangleRootContent};
pub use error::TangleError;
pub use tangle::{Tangle, TangleMember};
