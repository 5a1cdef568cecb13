//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum accepted upload body size in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// Session time-to-live in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Interval between expired-session sweeps in seconds. Zero disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Directory for local ciphertext fallback and transient plaintext.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory where markdown analysis reports are written.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_session_ttl_secs() -> u64 {
    crate::DEFAULT_SESSION_TTL_SECS
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./data/encrypted")
}

fn default_reports_dir() -> PathBuf {
    PathBuf::from("./data/reports")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
            session_ttl_secs: default_session_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            upload_dir: default_upload_dir(),
            reports_dir: default_reports_dir(),
        }
    }
}

impl ServerConfig {
    /// Get the session TTL as a Duration.
    pub fn session_ttl(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Get the sweep interval, if sweeping is enabled.
    pub fn sweep_interval(&self) -> Option<std::time::Duration> {
        if self.sweep_interval_secs == 0 {
            None
        } else {
            Some(std::time::Duration::from_secs(self.sweep_interval_secs))
        }
    }
}

/// Storage backend configuration for ciphertext artifacts.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
    /// S3-compatible object storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// AWS region.
        region: Option<String>,
        /// AWS access key ID. Falls back to the ambient credential chain if unset.
        /// WARNING: Prefer env vars or IAM roles over storing secrets in config files.
        access_key_id: Option<String>,
        /// AWS secret access key.
        secret_access_key: Option<String>,
        /// Force path-style URLs (`endpoint/bucket/key`). Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::S3 {
                access_key_id,
                secret_access_key,
                ..
            } => match (access_key_id.as_ref(), secret_access_key.as_ref()) {
                (Some(_), Some(_)) | (None, None) => Ok(()),
                _ => Err(
                    "s3 config requires both access_key_id and secret_access_key when either is set"
                        .to_string(),
                ),
            },
            _ => Ok(()),
        }
    }
}

/// Document-analysis collaborator configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Endpoint of the external analysis service. Processing fails when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Request timeout in seconds.
    #[serde(default = "default_analysis_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_analysis_timeout_secs() -> u64 {
    600
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_analysis_timeout_secs(),
        }
    }
}

/// Top-level application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Ciphertext storage backend.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Analysis collaborator.
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl AppConfig {
    /// Create a test configuration with relative scratch paths.
    ///
    /// **For testing only.** Tests normally override the paths with a tempdir.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                ..Default::default()
            },
            storage: StorageConfig::Filesystem {
                path: PathBuf::from("./test-data/storage"),
            },
            analysis: AnalysisConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.session_ttl(), Duration::hours(2));
        assert_eq!(
            config.sweep_interval(),
            Some(std::time::Duration::from_secs(300))
        );
    }

    #[test]
    fn test_sweep_disabled_at_zero() {
        let config = ServerConfig {
            sweep_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_s3_config_rejects_partial_credentials() {
        let config = StorageConfig::S3 {
            bucket: "bucket".to_string(),
            endpoint: None,
            region: None,
            access_key_id: Some("access".to_string()),
            secret_access_key: None,
            force_path_style: false,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_session_ttl_saturates() {
        let config = ServerConfig {
            session_ttl_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(config.session_ttl(), Duration::seconds(i64::MAX));
    }
}
