//! Expired-session sweeping.
//!
//! Sweeping evicts sessions past their TTL *and* deletes their backing
//! ciphertext, so an abandoned upload leaves nothing behind but the
//! object-storage lifecycle rule as a second line of defense.

use crate::state::AppState;
use coffer_core::StorageLocation;
use coffer_storage::StorageError;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Spawn the periodic sweep task.
pub fn spawn_sweep_task(state: AppState, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately; skip it so startup stays quiet
        ticker.tick().await;
        loop {
            ticker.tick().await;
            sweep_once(&state).await;
        }
    })
}

/// Evict expired sessions and delete their ciphertext. Returns the number
/// of sessions swept.
pub async fn sweep_once(state: &AppState) -> usize {
    let swept = state.sessions.sweep_expired().await;

    for session in &swept {
        for file in &session.files {
            let store = match &file.location {
                StorageLocation::S3 { .. } => match &state.object_storage {
                    Some(store) => store.clone(),
                    None => {
                        tracing::warn!(
                            session_id = %session.id,
                            location = %file.location,
                            "cannot delete orphaned ciphertext: object storage not configured"
                        );
                        continue;
                    }
                },
                StorageLocation::Local { .. } => state.local_storage.clone(),
            };

            match store.delete(file.location.key()).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    tracing::info!(
                        session_id = %session.id,
                        location = %file.location,
                        "deleted ciphertext of expired session"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id,
                        location = %file.location,
                        error = %e,
                        "failed to delete ciphertext of expired session"
                    );
                }
            }
        }
    }

    swept.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RemoteAnalyzer;
    use crate::state::AppState;
    use bytes::Bytes;
    use coffer_core::config::{AppConfig, ServerConfig, StorageConfig};
    use coffer_core::FileRecord;
    use coffer_session::SessionManager;
    use coffer_storage::{FilesystemBackend, ObjectStore};
    use std::sync::Arc;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn sweep_deletes_session_and_backing_ciphertext() {
        let temp = tempfile::tempdir().unwrap();
        let local: Arc<dyn ObjectStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());
        let sessions = Arc::new(SessionManager::in_memory(time::Duration::seconds(-1)));
        let analyzer = RemoteAnalyzer::from_config(&Default::default()).unwrap();

        let config = AppConfig {
            server: ServerConfig {
                upload_dir: temp.path().to_path_buf(),
                reports_dir: temp.path().join("reports"),
                ..Default::default()
            },
            storage: StorageConfig::Filesystem {
                path: temp.path().to_path_buf(),
            },
            analysis: Default::default(),
        };
        let state = AppState::new(config, None, local.clone(), sessions.clone(), analyzer);

        // An abandoned upload: session is already expired, ciphertext staged
        let new = sessions.create_session("salaried").await;
        let doc = state.cipher.encrypt(b"abandoned document", None).unwrap();
        let key = format!("encrypted_orphan.pdf_{}", new.id);
        local
            .put(&key, Bytes::from(doc.ciphertext))
            .await
            .unwrap();
        sessions
            .add_file(
                &new.id,
                FileRecord {
                    filename: "orphan.pdf".to_string(),
                    location: coffer_core::StorageLocation::Local { key: key.clone() },
                    metadata: doc.metadata,
                    key_material: doc.key_material,
                    uploaded_at: OffsetDateTime::now_utc(),
                },
            )
            .await
            .unwrap();

        let swept = sweep_once(&state).await;
        assert_eq!(swept, 1);
        assert!(!local.exists(&key).await.unwrap());
        assert!(sessions.snapshot(&new.id).await.is_none());

        // Nothing left to sweep
        assert_eq!(sweep_once(&state).await, 0);
    }
}
