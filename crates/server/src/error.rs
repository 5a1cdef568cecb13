//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Generic message for every validation failure. A caller probing session
/// ids, tokens, or keys learns nothing about which check failed.
const ACCESS_DENIED_MESSAGE: &str = "access denied";

/// API error response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Always "error".
    pub status: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unknown session, bad token, expired session, or bad processing key.
    /// Deliberately a single variant at the HTTP boundary.
    #[error("{ACCESS_DENIED_MESSAGE}")]
    AccessDenied,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("storage error: {0}")]
    Storage(#[from] coffer_storage::StorageError),

    #[error("{0}")]
    Crypto(#[from] coffer_crypto::CryptoError),

    #[error("analysis failed: {0}")]
    Analysis(#[from] crate::analysis::AnalysisError),
}

impl From<coffer_session::SessionError> for ApiError {
    fn from(_: coffer_session::SessionError) -> Self {
        // All four validation errors collapse here; the distinction stays in
        // logs and the session crate's own tests.
        Self::AccessDenied
    }
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AccessDenied => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) | Self::Storage(_) | Self::Crypto(_) | Self::Analysis(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_session::SessionError;

    #[test]
    fn test_validation_errors_are_indistinguishable() {
        let variants = [
            SessionError::InvalidSession,
            SessionError::InvalidToken,
            SessionError::Expired,
            SessionError::InvalidKey,
        ];

        for variant in variants {
            let api: ApiError = variant.into();
            assert_eq!(api.status_code(), StatusCode::FORBIDDEN);
            assert_eq!(api.to_string(), ACCESS_DENIED_MESSAGE);
        }
    }

    #[test]
    fn test_processing_errors_are_5xx() {
        let storage: ApiError = coffer_storage::StorageError::NotFound("k".into()).into();
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let crypto: ApiError = coffer_crypto::CryptoError::Decryption.into();
        assert_eq!(crypto.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
