//! Reactive note store.
//!
//! # Responsibility
//! - Own the application's note collection behind create/update/delete
//!   use-cases.
//! - Republish snapshots to subscribed views after each mutation.
//!
//! # Invariants
//! - Observers see state after a mutation, never during one.

pub mod note_store;
