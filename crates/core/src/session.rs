//! Upload session types and lifecycle.

use crate::secret::{random_urlsafe, TokenDigest};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use zeroize::Zeroizing;

/// Prefix for session identifiers.
const SESSION_ID_PREFIX: &str = "upload_";

/// Random bytes behind a session identifier: 128 bits.
const SESSION_ID_ENTROPY: usize = 16;

/// Unique identifier for an upload session.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random session ID.
    pub fn generate() -> Self {
        Self(format!(
            "{SESSION_ID_PREFIX}{}",
            random_urlsafe(SESSION_ID_ENTROPY)
        ))
    }

    /// Parse from a client-supplied string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let suffix = s
            .strip_prefix(SESSION_ID_PREFIX)
            .ok_or_else(|| crate::Error::InvalidSessionId(s.to_string()))?;
        let valid_len = (SESSION_ID_ENTROPY * 4).div_ceil(3);
        if suffix.len() != valid_len
            || !suffix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::InvalidSessionId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session state. Transitions are monotonic:
/// `Created -> FilesUploaded -> AccessGranted`, then deletion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Session exists but holds no files yet.
    Created,
    /// At least one encrypted file is registered.
    FilesUploaded,
    /// Access has been granted; a processing key is live.
    AccessGranted,
}

impl SessionStatus {
    /// Whether files may still be appended.
    pub fn can_accept_files(&self) -> bool {
        matches!(self, Self::Created | Self::FilesUploaded)
    }

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::FilesUploaded => "files_uploaded",
            Self::AccessGranted => "access_granted",
        }
    }
}

/// Where a ciphertext artifact lives. Chosen once at upload time and reused
/// verbatim for retrieval and deletion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageLocation {
    /// Object storage key (S3-compatible backend).
    S3 { key: String },
    /// Key under the local fallback directory.
    Local { key: String },
}

impl StorageLocation {
    /// The backend-relative object key.
    pub fn key(&self) -> &str {
        match self {
            Self::S3 { key } | Self::Local { key } => key,
        }
    }

    /// Whether this locator points at object storage.
    pub fn is_s3(&self) -> bool {
        matches!(self, Self::S3 { .. })
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 { key } => write!(f, "s3://{key}"),
            Self::Local { key } => write!(f, "local://{key}"),
        }
    }
}

/// Public encryption parameters for one ciphertext artifact.
///
/// Carries no secrets: key material lives in [`FileKeyMaterial`].
#[derive(Clone, Debug)]
pub struct EncryptionMetadata {
    /// Cipher identifier.
    pub algorithm: String,
    /// Key-derivation identifier.
    pub key_derivation: String,
    /// PBKDF2 iteration count.
    pub iterations: u32,
    /// Key-derivation salt.
    pub salt: Vec<u8>,
    /// CBC initialization vector.
    pub iv: Vec<u8>,
    /// HMAC-SHA256 tag over `iv || ciphertext`.
    pub mac: Vec<u8>,
    /// Ciphertext length in bytes.
    pub ciphertext_len: u64,
}

/// Secret key material for one file: the (possibly auto-generated) password
/// the encryption key is derived from. Held apart from the public metadata
/// and wiped on drop.
#[derive(Clone)]
pub struct FileKeyMaterial(Zeroizing<String>);

impl FileKeyMaterial {
    /// Wrap a password.
    pub fn new(password: String) -> Self {
        Self(Zeroizing::new(password))
    }

    /// The password, for key re-derivation during decryption.
    pub fn password(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FileKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileKeyMaterial")
            .field(&"<redacted>")
            .finish()
    }
}

/// One uploaded, encrypted file within a session.
#[derive(Clone, Debug)]
pub struct FileRecord {
    /// Client-supplied name. Untrusted; display and audit only.
    pub filename: String,
    /// Where the ciphertext lives.
    pub location: StorageLocation,
    /// Public encryption parameters.
    pub metadata: EncryptionMetadata,
    /// Guarded key material.
    pub key_material: FileKeyMaterial,
    /// When the file was registered.
    pub uploaded_at: OffsetDateTime,
}

/// An upload session: a time-bounded, single-use grant of processing rights
/// over a batch of encrypted files.
#[derive(Clone, Debug)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: SessionId,
    /// Client profile the analysis will run under.
    pub client_type: String,
    /// Digest of the access token returned at creation.
    pub access_token_digest: TokenDigest,
    /// Digest of the processing key. Present iff access has been granted.
    pub processing_key_digest: Option<TokenDigest>,
    /// Current lifecycle state.
    pub status: SessionStatus,
    /// When the session was created.
    pub created_at: OffsetDateTime,
    /// When the session stops accepting any operation.
    pub expires_at: OffsetDateTime,
    /// When access was granted, if it was.
    pub access_granted_at: Option<OffsetDateTime>,
    /// Registered files, in upload order.
    pub files: Vec<FileRecord>,
}

impl UploadSession {
    /// Create a new session with the given TTL.
    pub fn new(client_type: String, access_token_digest: TokenDigest, ttl: time::Duration) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: SessionId::generate(),
            client_type,
            access_token_digest,
            processing_key_digest: None,
            status: SessionStatus::Created,
            created_at: now,
            expires_at: now + ttl,
            access_granted_at: None,
            files: Vec::new(),
        }
    }

    /// Check whether the session is past its TTL.
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Whether access has been granted.
    pub fn access_granted(&self) -> bool {
        self.processing_key_digest.is_some()
    }
}
