use thiserror::Error;

use ssb_types::ErrorCode;

/// Errors from key handling, signing, hashing, and handshake-adjacent crypto.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material was the wrong length or otherwise malformed.
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    /// A signature did not verify against the given identity.
    #[error("signature verification failed")]
    VerificationFailed,
    /// A signature string was not parseable (bad base64, missing suffix).
    #[error("malformed signature: {0}")]
    MalformedSignature(String),
    /// The on-disk secret file was missing, unreadable, or malformed.
    #[error("secret file error: {0}")]
    SecretFile(String),
    /// An I/O error occurred reading or writing key material.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ErrorCode for CryptoError {
    fn code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "CRYPTO_INVALID_KEY",
            Self::VerificationFailed => "CRYPTO_VERIFICATION_FAILED",
            Self::MalformedSignature(_) => "CRYPTO_MALFORMED_SIGNATURE",
            Self::SecretFile(_) => "CRYPTO_SECRET_FILE_ERROR",
            Self::Io(_) => "CRYPTO_IO_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, CryptoError>;
