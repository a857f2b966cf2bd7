use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors constructing or appending to a tangle.
#[derive(Debug, Error)]
pub enum TangleError {
    /// The referenced base message does not exist, or is not a tangle root.
    #[error("not a tangle root: {0}")]
    NotATangleRoot(String),
    /// A `previous` parent passed to `append` belongs to a different tangle.
    #[error("parent {0} is not a member of this tangle")]
    ForeignParent(String),
    /// The underlying log store returned an error.
    #[error("store error: {0}")]
    Store(#[from] ssb_store::StoreError),
    /// A tangle content payload failed to (de)serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for TangleError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotATangleRoot(_) => "TANGLE_NOT_A_ROOT",
            Self::ForeignParent(_) => "TANGLE_FOREIGN_PARENT",
            Self::Store(_) => "TANGLE_STORE_ERROR",
            Self::Json(_) => "TANGLE_JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, TangleError>;
