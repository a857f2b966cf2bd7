//! Shared error trait and a small top-level error used where no more
//! specific crate error applies.

use thiserror::Error;

/// Assigns a stable, machine-readable string code to an error variant.
///
/// Every `thiserror`-derived enum in this workspace implements this trait so
/// callers (the CLI, logs, eventually a metrics layer) can key off a code
/// that survives message-text refactors.
pub trait ErrorCode {
    /// Returns the unique, stable string identifier for this error variant.
    fn code(&self) -> &'static str;
}

/// Errors that don't belong to one specific subsystem crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A value failed a basic shape/format check before any subsystem saw it.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// Catch-all for errors bubbled up from a subsystem crate as plain text.
    #[error("{0}")]
    Other(String),
}

impl ErrorCode for CoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidValue(_) => "CORE_INVALID_VALUE",
            Self::Other(_) => "CORE_OTHER",
        }
    }
}
