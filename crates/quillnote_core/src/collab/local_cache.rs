//! Local offline cache for shared documents.
//!
//! # Responsibility
//! - Keep an append-only log of binary `yrs` updates per room.
//! - Replay the log into a fresh document and record every later update.
//!
//! # Invariants
//! - Replay order equals append order.
//! - Compaction replaces a room's log with one snapshot that encodes the
//!   same document state.

use crate::db::{open_db_in_memory, DbResult};
use log::{debug, warn};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use yrs::updates::decoder::Decode;
use yrs::{Doc, ReadTxn, StateVector, Subscription, Transact, Update};

use super::lock;

/// Update log failures.
#[derive(Debug)]
pub enum UpdateLogError {
    Sqlite(rusqlite::Error),
    /// The medium refused the operation.
    Unavailable(String),
}

impl Display for UpdateLogError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Unavailable(reason) => write!(f, "update log unavailable: {reason}"),
        }
    }
}

impl Error for UpdateLogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Unavailable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for UpdateLogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

pub type UpdateLogResult<T> = Result<T, UpdateLogError>;

/// Per-room append-only store of encoded document updates.
pub trait UpdateLog: Send + Sync {
    /// All updates for `room`, oldest first.
    fn load_updates(&self, room: &str) -> UpdateLogResult<Vec<Vec<u8>>>;
    fn append_update(&self, room: &str, update: &[u8]) -> UpdateLogResult<()>;
    /// Replaces the room's log with a single snapshot update.
    fn compact(&self, room: &str, snapshot: &[u8]) -> UpdateLogResult<()>;
}

/// In-memory update log, with a switch that makes every call fail.
#[derive(Default)]
pub struct MemoryUpdateLog {
    rooms: Mutex<HashMap<String, Vec<Vec<u8>>>>,
    unavailable: AtomicBool,
}

impl MemoryUpdateLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every operation returns [`UpdateLogError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn update_count(&self, room: &str) -> usize {
        lock(&self.rooms).get(room).map_or(0, Vec::len)
    }

    fn check_available(&self) -> UpdateLogResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(UpdateLogError::Unavailable(
                "memory log switched off".to_string(),
            ));
        }
        Ok(())
    }
}

impl UpdateLog for MemoryUpdateLog {
    fn load_updates(&self, room: &str) -> UpdateLogResult<Vec<Vec<u8>>> {
        self.check_available()?;
        Ok(lock(&self.rooms).get(room).cloned().unwrap_or_default())
    }

    fn append_update(&self, room: &str, update: &[u8]) -> UpdateLogResult<()> {
        self.check_available()?;
        lock(&self.rooms)
            .entry(room.to_string())
            .or_default()
            .push(update.to_vec());
        Ok(())
    }

    fn compact(&self, room: &str, snapshot: &[u8]) -> UpdateLogResult<()> {
        self.check_available()?;
        lock(&self.rooms).insert(room.to_string(), vec![snapshot.to_vec()]);
        Ok(())
    }
}

/// SQLite-backed update log over the `doc_updates` table.
pub struct SqliteUpdateLog {
    conn: Mutex<Connection>,
}

impl SqliteUpdateLog {
    /// Wraps a connection that already has migrations applied.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    pub fn in_memory() -> DbResult<Self> {
        Ok(Self::new(open_db_in_memory()?))
    }

    pub fn update_count(&self, room: &str) -> UpdateLogResult<usize> {
        let count: i64 = lock(&self.conn).query_row(
            "SELECT COUNT(*) FROM doc_updates WHERE room = ?1;",
            params![room],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

impl UpdateLog for SqliteUpdateLog {
    fn load_updates(&self, room: &str) -> UpdateLogResult<Vec<Vec<u8>>> {
        let conn = lock(&self.conn);
        let mut stmt = conn.prepare("SELECT data FROM doc_updates WHERE room = ?1 ORDER BY id;")?;
        let rows = stmt.query_map(params![room], |row| row.get::<_, Vec<u8>>(0))?;
        let updates = rows.collect::<Result<Vec<_>, _>>()?;
        Ok(updates)
    }

    fn append_update(&self, room: &str, update: &[u8]) -> UpdateLogResult<()> {
        lock(&self.conn).execute(
            "INSERT INTO doc_updates (room, data) VALUES (?1, ?2);",
            params![room, update],
        )?;
        Ok(())
    }

    fn compact(&self, room: &str, snapshot: &[u8]) -> UpdateLogResult<()> {
        let mut conn = lock(&self.conn);
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM doc_updates WHERE room = ?1;", params![room])?;
        tx.execute(
            "INSERT INTO doc_updates (room, data) VALUES (?1, ?2);",
            params![room, snapshot],
        )?;
        tx.commit()?;
        Ok(())
    }
}

/// Live link between one room's document and the update log.
pub(crate) struct CacheBinding {
    room: String,
    log: Arc<dyn UpdateLog>,
    failure: Arc<Mutex<Option<UpdateLogError>>>,
    subscription: Option<Subscription>,
}

impl CacheBinding {
    /// Replays stored updates into `doc`, then records each new update.
    pub(crate) fn attach(room: &str, doc: &Doc, log: Arc<dyn UpdateLog>) -> UpdateLogResult<Self> {
        let stored = log.load_updates(room)?;
        let replayed = stored.len();
        if !stored.is_empty() {
            let mut txn = doc.transact_mut();
            for (index, bytes) in stored.iter().enumerate() {
                match Update::decode_v1(bytes) {
                    Ok(update) => {
                        if let Err(err) = txn.apply_update(update) {
                            warn!(
                                "event=cache_replay module=collab status=skipped room={room} index={index} reason={err}"
                            );
                        }
                    }
                    Err(err) => warn!(
                        "event=cache_replay module=collab status=skipped room={room} index={index} reason={err}"
                    ),
                }
            }
        }

        let failure: Arc<Mutex<Option<UpdateLogError>>> = Arc::new(Mutex::new(None));
        let subscription = {
            let log = Arc::clone(&log);
            let failure = Arc::clone(&failure);
            let room = room.to_string();
            doc.observe_update_v1(move |_txn, event| {
                if let Err(err) = log.append_update(&room, &event.update) {
                    warn!("event=cache_append module=collab status=error room={room} error={err}");
                    *lock(&failure) = Some(err);
                }
            })
            .map_err(|_| UpdateLogError::Unavailable("document is busy".to_string()))?
        };

        debug!("event=cache_attach module=collab status=ok room={room} replayed={replayed}");
        Ok(Self {
            room: room.to_string(),
            log,
            failure,
            subscription: Some(subscription),
        })
    }

    /// Takes the last write failure, if any.
    pub(crate) fn take_failure(&self) -> Option<UpdateLogError> {
        lock(&self.failure).take()
    }

    /// Stops recording and compacts the room's log into one snapshot.
    pub(crate) fn detach(mut self, doc: &Doc) -> UpdateLogResult<()> {
        self.subscription.take();
        let snapshot = doc
            .transact()
            .encode_state_as_update_v1(&StateVector::default());
        self.log.compact(&self.room, &snapshot)
    }
}
