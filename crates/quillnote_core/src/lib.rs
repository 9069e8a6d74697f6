//! Core domain logic for QuillNote.
//! This crate owns note persistence, the reactive note store and the
//! shared-document sessions; views only consume it.

pub mod clock;
pub mod collab;
pub mod config;
pub mod context;
pub mod db;
pub mod editor;
pub mod kv;
pub mod logging;
pub mod model;
pub mod preview;
pub mod repo;
pub mod route;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collab::local_cache::{MemoryUpdateLog, SqliteUpdateLog, UpdateLog, UpdateLogError};
pub use collab::peer_sync::{PeerStatus, PeerSyncConnector, PeerSyncProvider, SyncError};
pub use collab::relay::RelayConnector;
pub use collab::session::{
    SessionConfig, SessionError, SessionHandle, SessionManager, SyncState,
};
pub use config::{ConfigError, CoreConfig, PeerSyncConfig};
pub use context::{AppContext, ContextError};
pub use editor::binding::{ChangeKind, EditorBinding, EditorChange, ViewUpdate};
pub use editor::capability::{EditorCapability, EditorProfile, EditorProfileError};
pub use kv::{KeyValueStore, KvError, MemoryKvStore, SqliteKvStore};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::note::{Note, NoteDraft, NoteId, DEFAULT_NOTE_TITLE};
pub use repo::record_store::{NoteRecordStore, RecordStoreError};
pub use route::{resolve, Route};
pub use store::note_store::{NoteStore, NoteStoreError, NoteSummary, SubscriptionId};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
