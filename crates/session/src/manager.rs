//! Session lifecycle operations and the grant-access checkpoint.

use crate::error::{SessionError, SessionResult};
use crate::store::{MemorySessionStore, SessionStore};
use coffer_core::{FileRecord, SecretToken, SessionId, SessionStatus, UploadSession};
use std::sync::Arc;
use time::OffsetDateTime;

/// Identifiers handed back from session creation. The access token appears
/// here and nowhere else.
pub struct NewSession {
    /// The session identifier.
    pub id: SessionId,
    /// Bearer secret proving the right to grant processing later.
    pub access_token: SecretToken,
    /// When the session expires.
    pub expires_at: OffsetDateTime,
}

/// Result of a successful grant.
#[derive(Debug)]
pub struct GrantOutcome {
    /// Bearer secret for the immediately following processing call.
    pub processing_key: SecretToken,
    /// Number of files registered in the session.
    pub files_count: usize,
    /// When the grant happened.
    pub granted_at: OffsetDateTime,
}

/// Session manager: all mutations go through the injected store's
/// per-session serialization, and no lock is held across external I/O.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    ttl: time::Duration,
}

impl SessionManager {
    /// Create a manager over an injected store.
    pub fn new(store: Arc<dyn SessionStore>, ttl: time::Duration) -> Self {
        Self { store, ttl }
    }

    /// Create a manager over a fresh in-memory store.
    pub fn in_memory(ttl: time::Duration) -> Self {
        Self::new(Arc::new(MemorySessionStore::new()), ttl)
    }

    /// Create a new upload session.
    pub async fn create_session(&self, client_type: &str) -> NewSession {
        let access_token = SecretToken::generate();
        let session = UploadSession::new(
            client_type.to_string(),
            access_token.digest(),
            self.ttl,
        );
        let id = session.id.clone();
        let expires_at = session.expires_at;

        self.store.insert(session).await;
        tracing::info!(session_id = %id, "created upload session");

        NewSession {
            id,
            access_token,
            expires_at,
        }
    }

    /// Register an encrypted file. Permitted only while the session still
    /// accepts files (`created` or `files_uploaded`).
    pub async fn add_file(&self, id: &SessionId, file: FileRecord) -> SessionResult<()> {
        let filename = file.filename.clone();
        self.store
            .compare_and_update(
                id,
                Box::new(move |session| {
                    if !session.status.can_accept_files() {
                        return Err(SessionError::InvalidSession);
                    }
                    let mut updated = session.clone();
                    updated.files.push(file);
                    updated.status = SessionStatus::FilesUploaded;
                    Ok(updated)
                }),
            )
            .await?;

        tracing::info!(session_id = %id, filename = %filename, "registered file in session");
        Ok(())
    }

    /// The security checkpoint: verify possession of the access token and
    /// issue a processing key.
    ///
    /// Runs atomically inside the store's per-session critical section, so
    /// two racing grants serialize and at most one processing key is ever
    /// live: a re-grant (only possible before first processing, since
    /// processing deletes the session) rotates the key digest and strands
    /// the previous key.
    pub async fn grant_access(
        &self,
        id: &SessionId,
        access_token: &str,
    ) -> SessionResult<GrantOutcome> {
        let processing_key = SecretToken::generate();
        let key_digest = processing_key.digest();
        let presented = access_token.to_string();

        let updated = self
            .store
            .compare_and_update(
                id,
                Box::new(move |session| {
                    if !session.access_token_digest.verify(&presented) {
                        return Err(SessionError::InvalidToken);
                    }
                    if session.is_expired() {
                        return Err(SessionError::Expired);
                    }

                    let mut updated = session.clone();
                    updated.processing_key_digest = Some(key_digest);
                    updated.status = SessionStatus::AccessGranted;
                    updated.access_granted_at = Some(OffsetDateTime::now_utc());
                    Ok(updated)
                }),
            )
            .await?;

        tracing::info!(session_id = %id, files = updated.files.len(), "access granted");

        Ok(GrantOutcome {
            processing_key,
            files_count: updated.files.len(),
            granted_at: updated
                .access_granted_at
                .unwrap_or_else(OffsetDateTime::now_utc),
        })
    }

    /// List the session's files, gated on the processing key.
    ///
    /// Before a grant no key exists, so this always fails; ungranted
    /// bookkeeping goes through [`Self::snapshot`] instead and never reaches
    /// the client surface.
    pub async fn get_files(
        &self,
        id: &SessionId,
        processing_key: &str,
    ) -> SessionResult<Vec<FileRecord>> {
        let session = self.store.get(id).await.ok_or(SessionError::InvalidSession)?;

        match &session.processing_key_digest {
            Some(digest) if digest.verify(processing_key) => Ok(session.files),
            _ => Err(SessionError::InvalidKey),
        }
    }

    /// Snapshot a session for status reporting and internal bookkeeping.
    pub async fn snapshot(&self, id: &SessionId) -> Option<UploadSession> {
        self.store.get(id).await
    }

    /// Remove a session. Idempotent: returns false when already gone.
    pub async fn cleanup(&self, id: &SessionId) -> bool {
        let removed = self.store.remove(id).await;
        if removed {
            tracing::info!(session_id = %id, "cleaned up session");
        }
        removed
    }

    /// Evict every expired session, returning the evicted records so the
    /// caller can delete their backing ciphertext.
    pub async fn sweep_expired(&self) -> Vec<UploadSession> {
        let drained = self.store.drain_expired(OffsetDateTime::now_utc()).await;
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "swept expired sessions");
        }
        drained
    }
}
