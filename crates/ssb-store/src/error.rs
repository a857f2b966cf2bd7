use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors from the blob store, log store, and their on-disk indices.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred reading or writing the log, an index, or a blob.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// A log record failed to parse as JSON.
    #[error("malformed log record: {0}")]
    MalformedRecord(String),
    /// A JSON (de)serialization error from an index or metadata file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// A message failed signature verification and was rejected.
    #[error("signature verification failed for message from {0}")]
    SignatureInvalid(String),
    /// An appended message's sequence number did not follow the author's chain.
    #[error("sequence gap for {author}: expected {expected}, got {got}")]
    SequenceGap {
        /// The author whose feed had a gap.
        author: String,
        /// The sequence number that was expected next.
        expected: u64,
        /// The sequence number actually received.
        got: u64,
    },
    /// The requested message id or (author, sequence) pair is not in the log.
    #[error("not found: {0}")]
    NotFound(String),
    /// The log file is held open for writing by another process.
    #[error("log at {0} is locked by another process")]
    LockHeld(String),
    /// An on-disk index was corrupt and needed a full rebuild.
    #[error("index corrupt, rebuilding: {0}")]
    IndexCorrupt(String),
}

impl ErrorCode for StoreError {
    fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "STORE_IO_ERROR",
            Self::MalformedRecord(_) => "STORE_MALFORMED_RECORD",
            Self::Json(_) => "STORE_JSON_ERROR",
            Self::SignatureInvalid(_) => "STORE_SIGNATURE_INVALID",
            Self::SequenceGap { .. } => "STORE_SEQUENCE_GAP",
            Self::NotFound(_) => "STORE_NOT_FOUND",
            Self::LockHeld(_) => "STORE_LOCK_HELD",
            Self::IndexCorrupt(_) => "STORE_INDEX_CORRUPT",
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
