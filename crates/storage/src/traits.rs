//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;

/// Object store abstraction for ciphertext artifacts.
///
/// Documents are bounded by the upload body limit, so every operation works
/// on whole payloads; there is no streaming surface.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's content. Fails with `StorageError::NotFound` if absent.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Put an object atomically.
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()>;

    /// Delete an object. Fails with `StorageError::NotFound` if absent;
    /// cleanup paths collapse any failure to a per-artifact boolean rather
    /// than aborting the remaining deletions.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend ("s3", "filesystem").
    /// Used for logging and the health endpoint.
    fn backend_name(&self) -> &'static str;

    /// Verify backend connectivity. Called at startup so the server never
    /// reports healthy while its storage is unreachable.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
