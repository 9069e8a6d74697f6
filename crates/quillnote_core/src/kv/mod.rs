//! Local key-value storage medium.
//!
//! # Responsibility
//! - Define the string key/value contract both note persistence schemes
//!   write through.
//! - Provide in-memory and SQLite-backed implementations.
//!
//! # Invariants
//! - `set` overwrites; `remove` is idempotent.
//! - A write that returns `Ok` is complete on the backing medium.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

pub type KvResult<T> = Result<T, KvError>;

/// Storage-medium failure.
#[derive(Debug)]
pub enum KvError {
    Sqlite(rusqlite::Error),
    /// Write rejected because it would exceed the configured quota.
    QuotaExceeded {
        key: String,
        required_bytes: usize,
        quota_bytes: usize,
    },
}

impl Display for KvError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::QuotaExceeded {
                key,
                required_bytes,
                quota_bytes,
            } => write!(
                f,
                "storage quota exceeded writing `{key}`: {required_bytes} bytes needed, quota {quota_bytes}"
            ),
        }
    }
}

impl Error for KvError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for KvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// String key/value storage medium.
pub trait KeyValueStore {
    /// Reads one value.
    fn get(&self, key: &str) -> KvResult<Option<String>>;
    /// Writes one value, replacing any existing one.
    fn set(&mut self, key: &str, value: &str) -> KvResult<()>;
    /// Removes one key; absent keys are not an error.
    fn remove(&mut self, key: &str) -> KvResult<()>;
    /// Returns all keys starting with `prefix`, sorted ascending.
    fn keys_with_prefix(&self, prefix: &str) -> KvResult<Vec<String>>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> KvResult<()> {
        (**self).remove(key)
    }

    fn keys_with_prefix(&self, prefix: &str) -> KvResult<Vec<String>> {
        (**self).keys_with_prefix(prefix)
    }
}
