//! Session storage behind an injected trait.

use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use coffer_core::{SessionId, UploadSession};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// A serialized update applied to one session: sees the current record,
/// returns the replacement or an error (in which case nothing changes).
pub type UpdateFn = Box<dyn FnOnce(&UploadSession) -> SessionResult<UploadSession> + Send>;

/// Keyed session storage with per-session update serialization.
///
/// Implementations must guarantee that two concurrent
/// [`compare_and_update`](SessionStore::compare_and_update) calls on the same
/// id observe each other's effects; that is what makes grant-access atomic.
#[async_trait]
pub trait SessionStore: Send + Sync + 'static {
    /// Insert a new session record.
    async fn insert(&self, session: UploadSession);

    /// Snapshot a session by id.
    async fn get(&self, id: &SessionId) -> Option<UploadSession>;

    /// Atomically replace a session. Fails with `InvalidSession` when the id
    /// is unknown; propagates the closure's error untouched otherwise.
    /// Returns the stored replacement.
    async fn compare_and_update(
        &self,
        id: &SessionId,
        update: UpdateFn,
    ) -> SessionResult<UploadSession>;

    /// Remove a session. Returns false (not an error) when already gone.
    async fn remove(&self, id: &SessionId) -> bool;

    /// Remove and return every session past its expiry.
    async fn drain_expired(&self, now: OffsetDateTime) -> Vec<UploadSession>;
}

/// In-process session store. The single lock is fine at this scale: critical
/// sections are pure map operations, never held across I/O.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, UploadSession>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the store holds no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: UploadSession) {
        self.sessions
            .write()
            .await
            .insert(session.id.clone(), session);
    }

    async fn get(&self, id: &SessionId) -> Option<UploadSession> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn compare_and_update(
        &self,
        id: &SessionId,
        update: UpdateFn,
    ) -> SessionResult<UploadSession> {
        let mut sessions = self.sessions.write().await;
        let current = sessions.get(id).ok_or(SessionError::InvalidSession)?;
        let updated = update(current)?;
        sessions.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn drain_expired(&self, now: OffsetDateTime) -> Vec<UploadSession> {
        let mut sessions = self.sessions.write().await;
        let expired_ids: Vec<SessionId> = sessions
            .iter()
            .filter(|(_, s)| now > s.expires_at)
            .map(|(id, _)| id.clone())
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }
}
