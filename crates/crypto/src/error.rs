//! Encryption error types.

use thiserror::Error;

/// Encryption operation errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Deliberately coarse: bad tag, bad padding, wrong password, and
    /// malformed metadata are indistinguishable to callers.
    #[error("decryption failed: ciphertext rejected")]
    Decryption,

    #[error("malformed encryption metadata: {0}")]
    Metadata(String),
}

/// Result type for encryption operations.
pub type CryptoResult<T> = std::result::Result<T, CryptoError>;
