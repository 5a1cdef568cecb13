//! Integration tests for the session manager.

use coffer_core::{
    EncryptionMetadata, FileKeyMaterial, FileRecord, SessionStatus, StorageLocation,
};
use coffer_session::{SessionError, SessionManager};
use std::collections::HashSet;
use time::OffsetDateTime;

fn manager() -> SessionManager {
    SessionManager::in_memory(time::Duration::hours(2))
}

fn expired_manager() -> SessionManager {
    SessionManager::in_memory(time::Duration::seconds(-1))
}

fn sample_file(name: &str) -> FileRecord {
    FileRecord {
        filename: name.to_string(),
        location: StorageLocation::Local {
            key: format!("encrypted_{name}_test"),
        },
        metadata: EncryptionMetadata {
            algorithm: "AES-256-CBC".to_string(),
            key_derivation: "PBKDF2-SHA256".to_string(),
            iterations: 100_000,
            salt: vec![0u8; 16],
            iv: vec![0u8; 16],
            mac: vec![0u8; 32],
            ciphertext_len: 16,
        },
        key_material: FileKeyMaterial::new("password".to_string()),
        uploaded_at: OffsetDateTime::now_utc(),
    }
}

#[tokio::test]
async fn session_identifiers_never_repeat() {
    let manager = manager();
    let mut ids = HashSet::new();
    let mut access_tokens = HashSet::new();
    let mut processing_keys = HashSet::new();

    for _ in 0..10_000 {
        let new = manager.create_session("salaried").await;
        assert!(ids.insert(new.id.as_str().to_string()));
        assert!(access_tokens.insert(new.access_token.reveal().to_string()));

        let grant = manager
            .grant_access(&new.id, new.access_token.reveal())
            .await
            .unwrap();
        assert!(processing_keys.insert(grant.processing_key.reveal().to_string()));
    }

    // Access tokens and processing keys are drawn from the same generator
    // but must also never collide with each other
    assert!(access_tokens.is_disjoint(&processing_keys));
}

#[tokio::test]
async fn add_file_advances_status() {
    let manager = manager();
    let new = manager.create_session("business").await;

    manager.add_file(&new.id, sample_file("a.pdf")).await.unwrap();
    manager.add_file(&new.id, sample_file("b.pdf")).await.unwrap();

    let session = manager.snapshot(&new.id).await.unwrap();
    assert_eq!(session.status, SessionStatus::FilesUploaded);
    assert_eq!(session.files.len(), 2);
    assert_eq!(session.files[0].filename, "a.pdf");
    assert_eq!(session.files[1].filename, "b.pdf");
}

#[tokio::test]
async fn add_file_unknown_session() {
    let manager = manager();
    let id = coffer_core::SessionId::generate();
    assert_eq!(
        manager.add_file(&id, sample_file("x")).await.unwrap_err(),
        SessionError::InvalidSession
    );
}

#[tokio::test]
async fn add_file_rejected_after_grant() {
    let manager = manager();
    let new = manager.create_session("salaried").await;
    manager.add_file(&new.id, sample_file("a.pdf")).await.unwrap();
    manager
        .grant_access(&new.id, new.access_token.reveal())
        .await
        .unwrap();

    assert_eq!(
        manager
            .add_file(&new.id, sample_file("late.pdf"))
            .await
            .unwrap_err(),
        SessionError::InvalidSession
    );
}

#[tokio::test]
async fn grant_requires_matching_token() {
    let manager = manager();
    let new = manager.create_session("salaried").await;

    assert_eq!(
        manager
            .grant_access(&new.id, "not-the-token")
            .await
            .unwrap_err(),
        SessionError::InvalidToken
    );

    // Valid token still works afterwards
    manager
        .grant_access(&new.id, new.access_token.reveal())
        .await
        .unwrap();
}

#[tokio::test]
async fn grant_rejects_expired_session() {
    let manager = expired_manager();
    let new = manager.create_session("salaried").await;

    assert_eq!(
        manager
            .grant_access(&new.id, new.access_token.reveal())
            .await
            .unwrap_err(),
        SessionError::Expired
    );
}

#[tokio::test]
async fn file_listing_gated_on_processing_key() {
    let manager = manager();
    let new = manager.create_session("salaried").await;
    manager.add_file(&new.id, sample_file("doc.pdf")).await.unwrap();

    // Before grant: no key can possibly match
    assert_eq!(
        manager.get_files(&new.id, "anything").await.unwrap_err(),
        SessionError::InvalidKey
    );

    let grant = manager
        .grant_access(&new.id, new.access_token.reveal())
        .await
        .unwrap();

    // After grant: a fresh mismatched key still fails
    assert_eq!(
        manager.get_files(&new.id, "wrong-key").await.unwrap_err(),
        SessionError::InvalidKey
    );

    let files = manager
        .get_files(&new.id, grant.processing_key.reveal())
        .await
        .unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].filename, "doc.pdf");
}

#[tokio::test]
async fn regrant_rotates_processing_key() {
    let manager = manager();
    let new = manager.create_session("salaried").await;
    manager.add_file(&new.id, sample_file("doc.pdf")).await.unwrap();

    let first = manager
        .grant_access(&new.id, new.access_token.reveal())
        .await
        .unwrap();
    let second = manager
        .grant_access(&new.id, new.access_token.reveal())
        .await
        .unwrap();

    assert_ne!(
        first.processing_key.reveal(),
        second.processing_key.reveal()
    );

    // The stranded first key no longer opens the session
    assert_eq!(
        manager
            .get_files(&new.id, first.processing_key.reveal())
            .await
            .unwrap_err(),
        SessionError::InvalidKey
    );
    assert!(manager
        .get_files(&new.id, second.processing_key.reveal())
        .await
        .is_ok());
}

#[tokio::test]
async fn cleanup_is_idempotent() {
    let manager = manager();
    let new = manager.create_session("salaried").await;

    assert!(manager.cleanup(&new.id).await);
    assert!(!manager.cleanup(&new.id).await);

    // Every operation on the dead id now fails closed
    assert_eq!(
        manager
            .grant_access(&new.id, new.access_token.reveal())
            .await
            .unwrap_err(),
        SessionError::InvalidSession
    );
    assert_eq!(
        manager.get_files(&new.id, "any").await.unwrap_err(),
        SessionError::InvalidSession
    );
    assert!(manager.snapshot(&new.id).await.is_none());
}

#[tokio::test]
async fn sweep_returns_expired_sessions_with_files() {
    let expired = expired_manager();
    let new = expired.create_session("salaried").await;
    expired.add_file(&new.id, sample_file("orphan.pdf")).await.unwrap();

    let swept = expired.sweep_expired().await;
    assert_eq!(swept.len(), 1);
    assert_eq!(swept[0].files.len(), 1);
    assert_eq!(swept[0].files[0].filename, "orphan.pdf");

    // Second sweep finds nothing
    assert!(expired.sweep_expired().await.is_empty());
}

#[tokio::test]
async fn concurrent_grants_serialize() {
    use std::sync::Arc;

    let manager = Arc::new(manager());
    let new = manager.create_session("salaried").await;
    let token = new.access_token.reveal().to_string();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let id = new.id.clone();
        let token = token.clone();
        handles.push(tokio::spawn(async move {
            manager.grant_access(&id, &token).await
        }));
    }

    let keys: Vec<String> = futures_join_all(handles)
        .await
        .into_iter()
        .map(|grant| grant.unwrap().processing_key.reveal().to_string())
        .collect();

    // Every grant succeeded and rotated the digest; only the final rotation
    // can still open the session
    let live: Vec<&String> = {
        let mut live = Vec::new();
        for key in &keys {
            if manager.get_files(&new.id, key).await.is_ok() {
                live.push(key);
            }
        }
        live
    };
    assert_eq!(live.len(), 1);
}

async fn futures_join_all<T>(
    handles: Vec<tokio::task::JoinHandle<T>>,
) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.unwrap());
    }
    out
}
