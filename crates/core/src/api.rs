//! Wire DTOs for the secure HTTP surface.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Per-file summary in the upload response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadedFileSummary {
    /// Client-supplied filename.
    pub filename: String,
    /// Always true for files that made it into the session.
    pub encrypted: bool,
    /// Opaque locator (`s3://…` or `local://…`), not a server path.
    pub storage_location: String,
}

/// Response from `POST /secure/upload`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// "success".
    pub status: String,
    /// Human-readable summary.
    pub message: String,
    /// Session identifier for the follow-up grant call.
    pub upload_session_id: String,
    /// Bearer secret, shown exactly once.
    pub access_token: String,
    /// Files registered in the session.
    pub files: Vec<UploadedFileSummary>,
    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Artifact-deletion accounting for one processing run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SecuritySummary {
    /// Ciphertext objects deleted from object storage.
    pub s3_files_deleted: usize,
    /// Transient plaintext files deleted.
    pub temp_files_deleted: usize,
    /// Whether the session record was removed.
    pub session_cleaned: bool,
    /// "high" when every tracked artifact was confirmed deleted, else "medium".
    pub security_level: String,
}

/// Response from `POST /secure/session/{session_id}/grant`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessResponse {
    /// "success".
    pub status: String,
    /// Analysis task label.
    pub task: String,
    /// Cleaned analysis text.
    pub result: String,
    /// Full markdown report content.
    pub markdown: String,
    /// Path of the persisted markdown report.
    pub file_saved: String,
    /// Number of documents handed to the analyzer.
    pub processed_files: usize,
    /// Always "encrypted" on this surface.
    pub session_type: String,
    /// Whether the session record was removed.
    pub session_cleaned: bool,
    /// Per-object deletion status lines for object storage.
    pub s3_cleanup: Vec<String>,
    /// Transient plaintext files deleted.
    pub temp_files_cleaned: usize,
    /// Aggregated deletion accounting.
    pub security_summary: SecuritySummary,
}

/// Response from `GET /secure/session/{session_id}/status`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    /// "success".
    pub status: String,
    /// Echoed session identifier.
    pub session_id: String,
    /// One of `created|files_uploaded|access_granted|expired|not_found`.
    pub session_status: String,
}

/// Response from `GET /secure/health`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy".
    pub status: String,
    /// Service name.
    pub service: String,
    /// Active storage backend name.
    pub storage_backend: String,
    /// Feature list for probes and dashboards.
    pub features: Vec<String>,
}

/// Grant request form body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrantRequest {
    /// Bearer secret from the upload response.
    pub access_token: String,
    /// Client profile the analysis runs under.
    pub client_type: String,
}
