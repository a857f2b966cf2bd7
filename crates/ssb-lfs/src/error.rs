use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors from directory navigation and bind/unbind operations.
#[derive(Debug, Error)]
pub enum LfsError {
    /// `cd` found no live `bindD` entry with the requested name.
    #[error("no such directory: {0}")]
    NoSuchDirectory(String),
    /// `unlinkBlob`/`rmdir` found no live bind entry with the requested key.
    #[error("no such entry: {0}")]
    NotFound(String),
    /// `rmdir` on a directory that still has live entries.
    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),
    /// The tangle layer returned an error.
    #[error("tangle error: {0}")]
    Tangle(#[from] ssb_tangle::TangleError),
    /// A bind/unbind content payload failed to (de)serialize.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorCode for LfsError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoSuchDirectory(_) => "LFS_NO_SUCH_DIRECTORY",
            Self::NotFound(_) => "LFS_NOT_FOUND",
            Self::DirectoryNotEmpty(_) => "LFS_DIRECTORY_NOT_EMPTY",
            Self::Tangle(_) => "LFS_TANGLE_ERROR",
            Self::Json(_) => "LFS_JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, LfsError>;
