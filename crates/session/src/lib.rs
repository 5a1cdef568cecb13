//! Upload session management for Coffer.
//!
//! The [`SessionManager`] owns session lifecycle and access control:
//! creation, file registration, the grant-access security checkpoint,
//! processing-key-gated file listing, cleanup, and expiry sweeps. State
//! lives behind the injected [`SessionStore`] trait; the in-process
//! [`MemorySessionStore`] serves single-node deployments, and the trait is
//! the seam for an external TTL-capable key-value store.

pub mod error;
pub mod manager;
pub mod store;

pub use error::{SessionError, SessionResult};
pub use manager::{GrantOutcome, NewSession, SessionManager};
pub use store::{MemorySessionStore, SessionStore, UpdateFn};
