//! SQLite-backed key-value medium (`kv` table).

use super::{KeyValueStore, KvResult};
use crate::db::{open_db_in_memory, DbResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Owns a migrated connection and stores entries in the `kv` table.
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }

    /// Convenience constructor over a fresh in-memory database.
    pub fn in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    /// Returns the wrapped connection back to the caller.
    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1;", [key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> KvResult<()> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> KvResult<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> KvResult<Vec<String>> {
        // substr comparison avoids LIKE wildcard escaping for `_`/`%` in prefixes.
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv
             WHERE substr(key, 1, length(?1)) = ?1
             ORDER BY key ASC;",
        )?;
        let mut rows = stmt.query([prefix])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteKvStore;
    use crate::kv::KeyValueStore;

    #[test]
    fn set_overwrites_and_get_reads_back() {
        let mut store = SqliteKvStore::in_memory().unwrap();
        store.set("note-1", "first").unwrap();
        store.set("note-1", "second").unwrap();
        assert_eq!(store.get("note-1").unwrap().as_deref(), Some("second"));
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn prefix_scan_treats_underscore_literally() {
        let mut store = SqliteKvStore::in_memory().unwrap();
        store.set("note_a", "1").unwrap();
        store.set("noteXa", "2").unwrap();
        let keys = store.keys_with_prefix("note_").unwrap();
        assert_eq!(keys, vec!["note_a".to_string()]);
    }
}
