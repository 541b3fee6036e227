//! Per-request tenant database routing.
//!
//! A request binds its tenant selector into [`context`], the
//! [`router::QueryRouter`] turns that selector into a routing decision, and
//! the [`registry::ConnectionRegistry`] guarantees a connection profile
//! exists for whatever tenant was chosen.

pub mod context;
pub mod directory;
pub mod profile;
pub mod registry;
pub mod router;

use thiserror::Error;

pub use directory::{DirectoryEntry, DirectoryError, TenantDirectory};
pub use profile::ConnectionProfile;
pub use registry::ConnectionRegistry;
pub use router::QueryRouter;

/// Errors raised by the routing core
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// Base profile missing or malformed. Fatal, startup class.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid tenant identifier: {0:?}")]
    InvalidTenant(String),

    #[error("Schema changes are only allowed on '{base}', refused for '{target}'")]
    SchemaChangeRejected { target: String, base: String },
}
