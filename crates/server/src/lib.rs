//! HTTP service for the Coffer secure document flow.
//!
//! This crate provides the control plane over the other crates:
//! - Secure upload: encrypt-and-stage with session registration
//! - Grant-and-process: the possession-proved decrypt/analyze/destroy step
//! - Session status and health probes
//! - The analyzer boundary and markdown report persistence
//! - Expired-session sweeping with ciphertext deletion

pub mod analysis;
pub mod cleanup;
pub mod error;
pub mod handlers;
pub mod report;
pub mod routes;
pub mod state;
pub mod sweep;

pub use analysis::{AnalysisError, AnalyzedDocument, DocumentAnalyzer, RemoteAnalyzer};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
