//! Core domain types and shared logic for Coffer.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Session identifiers and bearer secrets
//! - Upload session lifecycle and file records
//! - Public encryption metadata and guarded key material
//! - Configuration
//! - Wire DTOs for the secure HTTP surface

pub mod api;
pub mod config;
pub mod error;
pub mod secret;
pub mod session;

pub use error::{Error, Result};
pub use secret::{SecretToken, TokenDigest};
pub use session::{
    EncryptionMetadata, FileKeyMaterial, FileRecord, SessionId, SessionStatus, StorageLocation,
    UploadSession,
};

/// Default session time-to-live: 2 hours.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 2 * 60 * 60;

/// PBKDF2 iteration count (OWASP recommended minimum).
pub const KDF_ITERATIONS: u32 = 100_000;

/// Salt length for key derivation: 128 bits.
pub const SALT_LEN: usize = 16;

/// Initialization vector length for AES-CBC: 128 bits.
pub const IV_LEN: usize = 16;
