//! Application context.
//!
//! # Responsibility
//! - Build the note store and the session manager from one configuration
//!   and hand them to callers explicitly.
//!
//! # Invariants
//! - Every view reads notes from the same store instance.
//! - Shared-document rooms for notes are named by the note id.

use crate::clock::{Clock, SystemClock};
use crate::collab::local_cache::SqliteUpdateLog;
use crate::collab::relay::RelayConnector;
use crate::collab::session::{SessionConfig, SessionError, SessionHandle, SessionManager};
use crate::config::{ConfigError, CoreConfig};
use crate::db::{db_path, open_db, open_db_in_dir, DbError};
use crate::editor::binding::EditorBinding;
use crate::kv::{KeyValueStore, SqliteKvStore};
use crate::model::note::NoteId;
use crate::route::{resolve, Route};
use crate::store::note_store::{NoteStore, NoteStoreError};
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Context construction failures.
#[derive(Debug)]
pub enum ContextError {
    Config(ConfigError),
    Db(DbError),
    Store(NoteStoreError),
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ContextError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<ConfigError> for ContextError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<DbError> for ContextError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<NoteStoreError> for ContextError {
    fn from(value: NoteStoreError) -> Self {
        Self::Store(value)
    }
}

/// Owned application services.
pub struct AppContext<S: KeyValueStore = SqliteKvStore> {
    config: CoreConfig,
    notes: NoteStore<S>,
    sessions: SessionManager,
}

impl AppContext<SqliteKvStore> {
    /// Opens the SQLite-backed context under `config.data_dir`.
    pub fn open(config: CoreConfig) -> Result<Self, ContextError> {
        config.validate()?;
        let kv_conn = open_db_in_dir(&config.data_dir)?;
        let cache_conn = open_db(db_path(&config.data_dir))?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let notes = NoteStore::open(SqliteKvStore::new(kv_conn), clock)?;

        let mut sessions = SessionManager::new(
            SessionConfig::from(&config.peer_sync),
            Arc::new(SqliteUpdateLog::new(cache_conn)),
        );
        if config.peer_sync.enabled {
            match RelayConnector::new(&config.peer_sync.signaling_urls) {
                Ok(connector) => sessions = sessions.with_peer_sync(Arc::new(connector)),
                Err(err) => warn!(
                    "event=context_open module=context status=degraded reason=peer_sync error={err}"
                ),
            }
        }

        info!(
            "event=context_open module=context status=ok notes={} peer_sync={}",
            notes.len(),
            config.peer_sync.enabled
        );
        Ok(Self {
            config,
            notes,
            sessions,
        })
    }
}

impl<S: KeyValueStore> AppContext<S> {
    /// Assembles a context from already built parts.
    pub fn from_parts(config: CoreConfig, notes: NoteStore<S>, sessions: SessionManager) -> Self {
        Self {
            config,
            notes,
            sessions,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn notes(&self) -> &NoteStore<S> {
        &self.notes
    }

    pub fn notes_mut(&mut self) -> &mut NoteStore<S> {
        &mut self.notes
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Resolves a navigation path against the current notes.
    pub fn route(&self, path: &str) -> Route {
        resolve(path, self.notes.notes())
    }

    /// Binding for an editor view on `id`, or `None` when the note is gone.
    pub fn bind_editor(&self, id: NoteId) -> Option<EditorBinding> {
        self.notes.find(id).map(|note| EditorBinding::new(note.id))
    }

    /// Opens the shared-document session for a note.
    pub fn open_note_session(&self, id: NoteId) -> Result<SessionHandle, SessionError> {
        self.sessions.open(&room_for(id))
    }
}

/// Shared-document room name for a note.
pub fn room_for(id: NoteId) -> String {
    id.to_string()
}
