//! Collaborative document sessions.
//!
//! # Responsibility
//! - Manage per-room `yrs` documents shared across editor views.
//! - Persist document updates to a local cache and optionally relay them
//!   to peers.
//!
//! # Invariants
//! - Session state lives behind `Mutex`es shared by manager clones and
//!   handles; a poisoned lock is recovered, never propagated as a panic.

pub mod local_cache;
pub mod peer_sync;
pub mod relay;
pub mod session;

use std::sync::{Mutex, MutexGuard};

pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
