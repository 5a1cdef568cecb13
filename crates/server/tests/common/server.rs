//! Server test utilities.

use async_trait::async_trait;
use coffer_core::config::{AppConfig, ServerConfig, StorageConfig};
use coffer_server::{AnalysisError, AnalyzedDocument, AppState, DocumentAnalyzer, create_router};
use coffer_session::SessionManager;
use coffer_storage::{FilesystemBackend, ObjectStore, StorageError, StorageResult};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

/// What the mock analyzer does when called.
#[derive(Clone)]
pub enum MockBehavior {
    /// Return this text.
    Succeed(String),
    /// Fail with an upstream-style error.
    Fail,
    /// Signal `started`, then block until the request is dropped.
    Hang,
}

/// Scriptable analyzer for driving the processing flow in tests.
pub struct MockAnalyzer {
    behavior: MockBehavior,
    /// Notified when an analyze call begins.
    pub started: Notify,
    /// Number of analyze calls observed.
    pub calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            started: Notify::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentAnalyzer for MockAnalyzer {
    async fn analyze(
        &self,
        _client_type: &str,
        _documents: &[AnalyzedDocument],
    ) -> Result<String, AnalysisError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();

        match &self.behavior {
            MockBehavior::Succeed(text) => Ok(text.clone()),
            MockBehavior::Fail => Err(AnalysisError::Request("mock analyzer failure".into())),
            MockBehavior::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(600)).await;
                Err(AnalysisError::Request("hang elapsed".into()))
            }
        }
    }
}

/// An object store that is never reachable, for fallback tests.
#[allow(dead_code)]
pub struct UnreachableStore;

#[async_trait]
impl ObjectStore for UnreachableStore {
    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Err(StorageError::Config("object storage unreachable".into()))
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn put(&self, _key: &str, _data: Bytes) -> StorageResult<()> {
        Err(StorageError::Config("object storage unreachable".into()))
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Err(StorageError::Config("object storage unreachable".into()))
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

/// Default analysis text: exercises the bold-marker cleanup on the way out.
#[allow(dead_code)]
pub const MOCK_ANALYSIS: &str = "# Analysis\n\n**Verdict**: everything checks out.";

/// `MOCK_ANALYSIS` after result cleaning.
#[allow(dead_code)]
pub const MOCK_ANALYSIS_CLEANED: &str = "# Analysis\n\nVerdict: everything checks out.";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub analyzer: Arc<MockAnalyzer>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Local-only storage, succeeding analyzer, 2-hour TTL.
    pub async fn new() -> Self {
        Self::build(
            MockBehavior::Succeed(MOCK_ANALYSIS.to_string()),
            false,
            time::Duration::hours(2),
        )
        .await
    }

    /// Local-only storage with the given analyzer behavior.
    pub async fn with_analyzer(behavior: MockBehavior) -> Self {
        Self::build(behavior, false, time::Duration::hours(2)).await
    }

    /// Object storage configured but unreachable; uploads must fall back.
    pub async fn with_failing_object_storage() -> Self {
        Self::build(
            MockBehavior::Succeed(MOCK_ANALYSIS.to_string()),
            true,
            time::Duration::hours(2),
        )
        .await
    }

    /// Sessions that are born expired.
    pub async fn with_expired_sessions() -> Self {
        Self::build(
            MockBehavior::Succeed(MOCK_ANALYSIS.to_string()),
            false,
            time::Duration::seconds(-1),
        )
        .await
    }

    async fn build(
        behavior: MockBehavior,
        failing_object_storage: bool,
        ttl: time::Duration,
    ) -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let upload_dir = temp_dir.path().join("encrypted");
        let reports_dir = temp_dir.path().join("reports");

        let local_storage: Arc<dyn ObjectStore> = Arc::new(
            FilesystemBackend::new(&upload_dir)
                .await
                .expect("Failed to create local storage"),
        );

        let object_storage: Option<Arc<dyn ObjectStore>> = if failing_object_storage {
            Some(Arc::new(UnreachableStore))
        } else {
            None
        };

        let config = AppConfig {
            server: ServerConfig {
                bind: "127.0.0.1:0".to_string(),
                upload_dir: upload_dir.clone(),
                reports_dir,
                ..Default::default()
            },
            storage: StorageConfig::Filesystem {
                path: upload_dir.clone(),
            },
            analysis: Default::default(),
        };

        let sessions = Arc::new(SessionManager::in_memory(ttl));
        let analyzer = Arc::new(MockAnalyzer::new(behavior));

        let state = AppState::new(
            config,
            object_storage,
            local_storage,
            sessions,
            analyzer.clone(),
        );
        let router = create_router(state.clone());

        Self {
            router,
            state,
            analyzer,
            _temp_dir: temp_dir,
        }
    }

    /// The directory holding ciphertext fallbacks and transient plaintext.
    pub fn upload_dir(&self) -> PathBuf {
        self.state.config.server.upload_dir.clone()
    }

    /// Count regular files under the upload directory.
    pub fn upload_dir_file_count(&self) -> usize {
        match std::fs::read_dir(self.upload_dir()) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                .count(),
            Err(_) => 0,
        }
    }
}

/// Build a multipart/form-data body for the upload endpoint.
/// Returns (content-type header value, body bytes).
#[allow(dead_code)]
pub fn multipart_body(client_type: Option<&str>, files: &[(&str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "coffer-test-boundary";
    let mut body = Vec::new();

    if let Some(client_type) = client_type {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"client_type\"\r\n\r\n{client_type}\r\n"
            )
            .as_bytes(),
        );
    }

    for (filename, data) in files {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={boundary}"), body)
}
