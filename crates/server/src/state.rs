//! Application state shared across handlers.

use crate::analysis::DocumentAnalyzer;
use crate::error::{ApiError, ApiResult};
use coffer_core::config::AppConfig;
use coffer_core::StorageLocation;
use coffer_crypto::DocumentCipher;
use coffer_session::SessionManager;
use coffer_storage::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Object storage, when configured. Uploads prefer it and fall back to
    /// local storage when it is unreachable.
    pub object_storage: Option<Arc<dyn ObjectStore>>,
    /// Local filesystem storage: the fallback backend, and the primary one
    /// when no object storage is configured.
    pub local_storage: Arc<dyn ObjectStore>,
    /// Session manager.
    pub sessions: Arc<SessionManager>,
    /// Document cipher.
    pub cipher: DocumentCipher,
    /// Analysis collaborator.
    pub analyzer: Arc<dyn DocumentAnalyzer>,
}

impl AppState {
    /// Create a new application state. Panics on invalid storage
    /// configuration; startup is the right time to find out.
    pub fn new(
        config: AppConfig,
        object_storage: Option<Arc<dyn ObjectStore>>,
        local_storage: Arc<dyn ObjectStore>,
        sessions: Arc<SessionManager>,
        analyzer: Arc<dyn DocumentAnalyzer>,
    ) -> Self {
        if let Err(error) = config.storage.validate() {
            panic!("Invalid storage configuration: {error}");
        }

        Self {
            config: Arc::new(config),
            object_storage,
            local_storage,
            sessions,
            cipher: DocumentCipher::new(),
            analyzer,
        }
    }

    /// Resolve the store a location was written to. The choice was recorded
    /// at upload time, so retrieval never guesses.
    pub fn store_for(&self, location: &StorageLocation) -> ApiResult<Arc<dyn ObjectStore>> {
        match location {
            StorageLocation::S3 { .. } => self.object_storage.clone().ok_or_else(|| {
                ApiError::Internal(
                    "session references object storage but none is configured".to_string(),
                )
            }),
            StorageLocation::Local { .. } => Ok(self.local_storage.clone()),
        }
    }

    /// Directory for transient plaintext files.
    pub fn plaintext_dir(&self) -> PathBuf {
        self.config.server.upload_dir.clone()
    }

    /// Name of the backend uploads go to first.
    pub fn primary_backend_name(&self) -> &'static str {
        match &self.object_storage {
            Some(store) => store.backend_name(),
            None => self.local_storage.backend_name(),
        }
    }
}
