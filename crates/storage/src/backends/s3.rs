//! S3-compatible storage backend using the AWS SDK.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, ExpirationStatus, LifecycleExpiration, LifecycleRule,
    LifecycleRuleFilter, ServerSideEncryption,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::instrument;

/// Key prefix for ciphertext objects. The lifecycle expiration rule is
/// scoped to this prefix.
pub const ENCRYPTED_PREFIX: &str = "encrypted/";

/// Lifecycle expiration for ciphertext objects, in days. Defense in depth
/// only; application-level cleanup is the authoritative deletion path.
const LIFECYCLE_EXPIRY_DAYS: i32 = 30;

/// S3-compatible object store.
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl S3Backend {
    /// Create a new S3 backend. Construction builds the client but performs
    /// no network I/O; call [`Self::health_check`] and
    /// [`Self::ensure_lifecycle`] at startup.
    pub async fn new(
        bucket: &str,
        endpoint: Option<String>,
        region: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        if access_key_id.is_some() ^ secret_access_key.is_some() {
            return Err(StorageError::Config(
                "s3 config requires both access_key_id and secret_access_key when either is set"
                    .to_string(),
            ));
        }

        let resolved_region = region.unwrap_or_else(|| "us-east-1".to_string());
        let mut config_builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(aws_config::Region::new(resolved_region.clone()));

        // Explicit credentials from config, or the ambient AWS chain
        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            let credentials =
                aws_sdk_s3::config::Credentials::new(key_id, secret, None, None, "coffer-config");
            config_builder = config_builder.credentials_provider(credentials);
        } else {
            let chain = aws_config::default_provider::credentials::DefaultCredentialsChain::builder()
                .region(aws_config::Region::new(resolved_region))
                .build()
                .await;
            config_builder = config_builder.credentials_provider(chain);
        }

        if let Some(endpoint_url) = endpoint {
            // Handle bare host:port endpoints (e.g., "minio:9000")
            let endpoint_lower = endpoint_url.to_lowercase();
            let normalized = if endpoint_lower.starts_with("http://")
                || endpoint_lower.starts_with("https://")
            {
                endpoint_url
            } else {
                format!("http://{endpoint_url}")
            };
            config_builder = config_builder.endpoint_url(normalized);
        }

        if force_path_style {
            config_builder = config_builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(config_builder.build()),
            bucket: bucket.to_string(),
        })
    }

    /// Install the 30-day expiration rule for the `encrypted/` prefix.
    ///
    /// Best effort: the bucket may deny lifecycle configuration to this
    /// principal, which is logged and tolerated.
    pub async fn ensure_lifecycle(&self) {
        match self.lifecycle_configuration() {
            Ok(config) => {
                let request = self
                    .client
                    .put_bucket_lifecycle_configuration()
                    .bucket(&self.bucket)
                    .lifecycle_configuration(config);
                if let Err(e) = request.send().await {
                    tracing::warn!(
                        bucket = %self.bucket,
                        error = %e,
                        "failed to install lifecycle expiration rule"
                    );
                } else {
                    tracing::info!(
                        bucket = %self.bucket,
                        days = LIFECYCLE_EXPIRY_DAYS,
                        "lifecycle expiration rule installed"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(bucket = %self.bucket, error = %e, "invalid lifecycle configuration");
            }
        }
    }

    fn lifecycle_configuration(&self) -> StorageResult<BucketLifecycleConfiguration> {
        let rule = LifecycleRule::builder()
            .id("coffer-encrypted-expiry")
            .status(ExpirationStatus::Enabled)
            .filter(
                LifecycleRuleFilter::builder()
                    .prefix(ENCRYPTED_PREFIX)
                    .build(),
            )
            .expiration(
                LifecycleExpiration::builder()
                    .days(LIFECYCLE_EXPIRY_DAYS)
                    .build(),
            )
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        BucketLifecycleConfiguration::builder()
            .rules(rule)
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Convert an AWS SDK error to StorageError, mapping NotFound appropriately.
    fn map_sdk_error<E>(err: aws_sdk_s3::error::SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
            if service_err.raw().status().as_u16() == 404 {
                return StorageError::NotFound(key.to_string());
            }
        }
        StorageError::S3(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    #[instrument(skip(self), fields(backend = "s3"))]
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if let aws_sdk_s3::error::SdkError::ServiceError(ref service_err) = err {
                    if service_err.raw().status().as_u16() == 404 {
                        return Ok(false);
                    }
                }
                Err(StorageError::S3(Box::new(err)))
            }
        }
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?;
        Ok(data.into_bytes())
    }

    #[instrument(skip(self, data), fields(backend = "s3", size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type("application/octet-stream")
            // S3-level encryption on top of the application-level ciphertext
            .server_side_encryption(ServerSideEncryption::Aes256)
            .metadata("file-status", "encrypted")
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn health_check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &self.bucket))?;
        Ok(())
    }
}
