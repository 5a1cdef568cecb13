//! HTTP handlers.

pub mod secure;

pub use secure::{grant_and_process, health, secure_upload, session_status};
