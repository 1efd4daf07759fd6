//! # auditlog-core
//!
//! Schema and value types for change tracking, shared by every auditlog crate:
//! - Field and entity declarations, resolved into a [`schema::Schema`]
//! - Field values and instance snapshots
//! - Field-level diffing with masking, and human-readable display of changes
//! - The `LogEntry` history record and its `changes` payload
//! - Cross-cutting error types

pub mod changes;
pub mod diff;
pub mod display;
pub mod entity;
pub mod enums;
pub mod errors;
pub mod field;
pub mod instance;
pub mod log_entry;
pub mod schema;
pub mod tracking;
pub mod value;
