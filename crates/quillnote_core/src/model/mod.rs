//! Domain model for notes.
//!
//! # Responsibility
//! - Define the canonical note record shared by both persistence schemes.
//! - Keep timestamp rules (`created_at <= updated_at`, monotonic updates)
//!   next to the data they protect.
//!
//! # Invariants
//! - Every note is identified by a stable `NoteId` that never changes.
//! - Deletion is a hard delete; there are no tombstones.

pub mod note;
