//! Session error types.
//!
//! The variants are distinct for logging and tests; the HTTP layer collapses
//! all of them to one generic response so a caller probing tokens cannot
//! learn which check failed.

use thiserror::Error;

/// Session operation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("unknown session")]
    InvalidSession,

    #[error("access token mismatch")]
    InvalidToken,

    #[error("session expired")]
    Expired,

    #[error("processing key mismatch")]
    InvalidKey,
}

/// Result type for session operations.
pub type SessionResult<T> = std::result::Result<T, SessionError>;
