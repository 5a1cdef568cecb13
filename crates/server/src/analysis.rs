//! The document-analysis collaborator boundary.
//!
//! The external analysis pipeline is opaque: long-running, and its output
//! shape is not under our control. The contract is narrowed here, once:
//! an analyzer returns either a plain non-empty string or an
//! [`AnalysisError`]. Nothing downstream ever inspects result shapes.

use async_trait::async_trait;
use coffer_core::config::AnalysisConfig;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Analysis failure, opaque upstream cause.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis endpoint not configured")]
    NotConfigured,

    #[error("analysis request failed: {0}")]
    Request(String),

    #[error("analysis returned an unusable response: {0}")]
    Malformed(String),
}

/// One decrypted document handed to the analyzer.
#[derive(Clone, Debug)]
pub struct AnalyzedDocument {
    /// Client-supplied filename, for prompt context only.
    pub filename: String,
    /// Decrypted document text.
    pub text: String,
}

/// The narrow analyzer contract.
#[async_trait]
pub trait DocumentAnalyzer: Send + Sync + 'static {
    /// Run the analysis. Returns the result text or fails; never returns
    /// partial or structured output.
    async fn analyze(
        &self,
        client_type: &str,
        documents: &[AnalyzedDocument],
    ) -> Result<String, AnalysisError>;

    /// Label for reports and response envelopes.
    fn task_name(&self, client_type: &str) -> String {
        format!("secure_analysis_{client_type}")
    }
}

/// HTTP adapter to the external analysis service.
pub struct RemoteAnalyzer {
    client: reqwest::Client,
    endpoint: String,
}

impl RemoteAnalyzer {
    /// Create an analyzer for the given endpoint.
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self, AnalysisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AnalysisError::Request(e.to_string()))?;
        Ok(Self { client, endpoint })
    }

    /// Build the configured analyzer: remote when an endpoint is set,
    /// otherwise one that fails every call with `NotConfigured`.
    pub fn from_config(config: &AnalysisConfig) -> Result<Arc<dyn DocumentAnalyzer>, AnalysisError> {
        match &config.endpoint {
            Some(endpoint) => {
                let analyzer = Self::new(
                    endpoint.clone(),
                    Duration::from_secs(config.timeout_secs),
                )?;
                Ok(Arc::new(analyzer))
            }
            None => Ok(Arc::new(UnconfiguredAnalyzer)),
        }
    }

    /// Accept exactly one response shape: a bare JSON string, or an object
    /// with a non-empty string `result` field.
    fn extract_result(body: &Value) -> Result<String, AnalysisError> {
        let text = match body {
            Value::String(s) => s.as_str(),
            Value::Object(map) => match map.get("result") {
                Some(Value::String(s)) => s.as_str(),
                _ => {
                    return Err(AnalysisError::Malformed(
                        "expected a string `result` field".to_string(),
                    ));
                }
            },
            _ => {
                return Err(AnalysisError::Malformed(
                    "expected a string or an object".to_string(),
                ));
            }
        };

        if text.trim().is_empty() {
            return Err(AnalysisError::Malformed("empty result".to_string()));
        }
        Ok(text.to_string())
    }
}

#[async_trait]
impl DocumentAnalyzer for RemoteAnalyzer {
    async fn analyze(
        &self,
        client_type: &str,
        documents: &[AnalyzedDocument],
    ) -> Result<String, AnalysisError> {
        let payload = serde_json::json!({
            "client_type": client_type,
            "documents": documents
                .iter()
                .map(|d| serde_json::json!({ "filename": d.filename, "text": d.text }))
                .collect::<Vec<_>>(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AnalysisError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnalysisError::Request(format!(
                "analysis service returned {status}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::Malformed(e.to_string()))?;
        Self::extract_result(&body)
    }
}

/// Placeholder analyzer for deployments without an analysis endpoint.
struct UnconfiguredAnalyzer;

#[async_trait]
impl DocumentAnalyzer for UnconfiguredAnalyzer {
    async fn analyze(
        &self,
        _client_type: &str,
        _documents: &[AnalyzedDocument],
    ) -> Result<String, AnalysisError> {
        Err(AnalysisError::NotConfigured)
    }
}
