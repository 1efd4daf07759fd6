//! # auditlog-registry
//!
//! Registration contract for change tracking.
//!
//! An [`AuditlogRegistry`] decides which entities are tracked, which actions
//! are logged for them, and which fields each registration captures. Registries
//! are plain values built at startup and handed to the storage service; any
//! number of them may coexist, each producing its own log entries.

pub mod error;
pub mod registry;

pub use error::RegistryError;
pub use registry::{AllModelsOptions, AuditlogRegistry, RegistrationOptions, RegistryFlags};
