//! Per-record note persistence.
//!
//! # Responsibility
//! - Store each note under its own namespaced key on a key-value medium.
//! - Keep JSON encoding and corruption handling inside the persistence
//!   boundary.
//!
//! # Invariants
//! - Corrupt records surface as absence, never as a crash.
//! - Storage-medium failures surface as `StorageFailure`, never swallowed.

pub mod record_store;
