//! Guaranteed artifact cleanup for the processing step.
//!
//! Every ciphertext locator and transient plaintext path touched during
//! processing is tracked by a [`CleanupGuard`]. The normal paths (success
//! and expected failure) consume the guard with [`CleanupGuard::run`] and
//! get a [`CleanupReport`] back; if the request future is dropped instead —
//! cancellation, panic — the guard's `Drop` spawns the same deletion work on
//! the runtime. Plaintext never outlives the processing step on any path.

use coffer_core::{SessionId, StorageLocation};
use coffer_session::SessionManager;
use coffer_storage::{ObjectStore, StorageError};
use std::path::PathBuf;
use std::sync::Arc;

/// Deletion accounting for one processing run.
///
/// Failures are collapsed to counters and status lines, never errors: one
/// stuck artifact must not abort the remaining deletions, but it must also
/// never be silently dropped — every failure is logged as a warning and
/// lowers the reported security level.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Per-object status lines for object-storage deletions.
    pub s3_cleanup: Vec<String>,
    /// Ciphertext objects deleted from object storage.
    pub s3_files_deleted: usize,
    /// Ciphertext files deleted from local fallback storage.
    pub local_files_deleted: usize,
    /// Transient plaintext files deleted.
    pub temp_files_deleted: usize,
    /// Deletions that failed (any kind).
    pub failed_deletions: usize,
    /// Whether the session record was removed.
    pub session_cleaned: bool,
}

impl CleanupReport {
    /// "high" when every tracked artifact was confirmed gone, else "medium".
    pub fn security_level(&self) -> &'static str {
        if self.failed_deletions == 0 && self.session_cleaned {
            "high"
        } else {
            "medium"
        }
    }
}

/// Tracks artifacts created during processing and guarantees their deletion.
pub struct CleanupGuard {
    s3: Option<Arc<dyn ObjectStore>>,
    local: Arc<dyn ObjectStore>,
    sessions: Arc<SessionManager>,
    session_id: SessionId,
    ciphertext: Vec<StorageLocation>,
    plaintext: Vec<PathBuf>,
    armed: bool,
}

impl CleanupGuard {
    /// Create a guard for one session's processing run.
    pub fn new(
        s3: Option<Arc<dyn ObjectStore>>,
        local: Arc<dyn ObjectStore>,
        sessions: Arc<SessionManager>,
        session_id: SessionId,
    ) -> Self {
        Self {
            s3,
            local,
            sessions,
            session_id,
            ciphertext: Vec::new(),
            plaintext: Vec::new(),
            armed: true,
        }
    }

    /// Track a ciphertext artifact for deletion.
    pub fn track_ciphertext(&mut self, location: StorageLocation) {
        self.ciphertext.push(location);
    }

    /// Track a transient plaintext file for deletion.
    pub fn track_plaintext(&mut self, path: PathBuf) {
        self.plaintext.push(path);
    }

    /// Delete everything tracked, plus the session record, and report.
    pub async fn run(mut self) -> CleanupReport {
        self.armed = false;
        let ciphertext = std::mem::take(&mut self.ciphertext);
        let plaintext = std::mem::take(&mut self.plaintext);

        Self::execute(
            self.s3.clone(),
            self.local.clone(),
            self.sessions.clone(),
            self.session_id.clone(),
            ciphertext,
            plaintext,
        )
        .await
    }

    async fn execute(
        s3: Option<Arc<dyn ObjectStore>>,
        local: Arc<dyn ObjectStore>,
        sessions: Arc<SessionManager>,
        session_id: SessionId,
        ciphertext: Vec<StorageLocation>,
        plaintext: Vec<PathBuf>,
    ) -> CleanupReport {
        let mut report = CleanupReport::default();

        // Plaintext first: it is the most sensitive artifact
        for path in &plaintext {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {
                    report.temp_files_deleted += 1;
                    tracing::info!(session_id = %session_id, path = %path.display(), "deleted transient plaintext");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::info!(session_id = %session_id, path = %path.display(), "transient plaintext already removed");
                }
                Err(e) => {
                    report.failed_deletions += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        path = %path.display(),
                        error = %e,
                        "failed to delete transient plaintext"
                    );
                }
            }
        }

        for location in &ciphertext {
            let store = match location {
                StorageLocation::S3 { .. } => match &s3 {
                    Some(store) => store,
                    None => {
                        report.failed_deletions += 1;
                        report
                            .s3_cleanup
                            .push(format!("failed to delete: {}", location.key()));
                        tracing::warn!(
                            session_id = %session_id,
                            location = %location,
                            "object storage not configured, cannot delete ciphertext"
                        );
                        continue;
                    }
                },
                StorageLocation::Local { .. } => &local,
            };

            match store.delete(location.key()).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    if location.is_s3() {
                        report.s3_files_deleted += 1;
                        report
                            .s3_cleanup
                            .push(format!("deleted: {}", location.key()));
                    } else {
                        report.local_files_deleted += 1;
                    }
                    tracing::info!(session_id = %session_id, location = %location, "deleted ciphertext artifact");
                }
                Err(e) => {
                    report.failed_deletions += 1;
                    if location.is_s3() {
                        report
                            .s3_cleanup
                            .push(format!("failed to delete: {}", location.key()));
                    }
                    tracing::warn!(
                        session_id = %session_id,
                        location = %location,
                        error = %e,
                        "failed to delete ciphertext artifact"
                    );
                }
            }
        }

        report.session_cleaned = sessions.cleanup(&session_id).await;

        tracing::info!(
            session_id = %session_id,
            s3_deleted = report.s3_files_deleted,
            local_deleted = report.local_files_deleted,
            temp_deleted = report.temp_files_deleted,
            failed = report.failed_deletions,
            session_cleaned = report.session_cleaned,
            security_level = report.security_level(),
            "processing cleanup complete"
        );

        report
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Dropped without running: the request was cancelled or the handler
        // panicked mid-processing. The deletion work still has to happen.
        tracing::warn!(
            session_id = %self.session_id,
            ciphertext = self.ciphertext.len(),
            plaintext = self.plaintext.len(),
            "processing interrupted, running background cleanup"
        );

        let s3 = self.s3.take();
        let local = self.local.clone();
        let sessions = self.sessions.clone();
        let session_id = self.session_id.clone();
        let ciphertext = std::mem::take(&mut self.ciphertext);
        let plaintext = std::mem::take(&mut self.plaintext);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    Self::execute(s3, local, sessions, session_id, ciphertext, plaintext).await;
                });
            }
            Err(_) => {
                tracing::error!(
                    session_id = %session_id,
                    "no runtime available for interrupted-processing cleanup; artifacts may remain"
                );
            }
        }
    }
}
