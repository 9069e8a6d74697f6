//! Per-room shared-document sessions.
//!
//! # Responsibility
//! - Keep at most one live `yrs::Doc` per room, shared by every handle.
//! - Attach the local cache on first open and optional peer sync on top.
//! - Tear a session down only when its last handle is released.
//!
//! # Invariants
//! - The open count of a registered room is always at least one.
//! - Teardown finishes before the same room can be opened again, so the
//!   final compaction never races a new session's writes.
//! - Peer-sync problems degrade the session to offline; they never fail
//!   `open`.
//! - Local-cache problems are reported as `PersistenceFailure`.

use super::local_cache::{CacheBinding, UpdateLog, UpdateLogError};
use super::lock;
use super::peer_sync::{PeerStatus, PeerSyncConnector, PeerSyncProvider};
use crate::config::PeerSyncConfig;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use yrs::{Doc, GetString, Text, TextRef, Transact};

/// Name of the shared text root holding note content.
pub const CONTENT_TEXT_NAME: &str = "content";

/// Default wait for a peer-sync provider to report `Connected`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Session-level failures.
#[derive(Debug)]
pub enum SessionError {
    /// The local cache could not be attached or written.
    PersistenceFailure {
        room: String,
        source: UpdateLogError,
    },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PersistenceFailure { room, source } => {
                write!(f, "local cache failed for room `{room}`: {source}")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::PersistenceFailure { source, .. } => Some(source),
        }
    }
}

/// Peer-sync state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Connecting,
    Online,
}

/// Session manager settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub peer_sync_enabled: bool,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            peer_sync_enabled: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl From<&PeerSyncConfig> for SessionConfig {
    fn from(value: &PeerSyncConfig) -> Self {
        Self {
            peer_sync_enabled: value.enabled,
            connect_timeout: value.connect_timeout(),
        }
    }
}

struct PeerSlot {
    state: Mutex<SyncState>,
    provider: Mutex<Option<Box<dyn PeerSyncProvider>>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl PeerSlot {
    fn offline() -> Self {
        Self {
            state: Mutex::new(SyncState::Offline),
            provider: Mutex::new(None),
            watchdog: Mutex::new(None),
        }
    }

    fn set_state(&self, state: SyncState) {
        *lock(&self.state) = state;
    }

    fn destroy_provider(&self) {
        if let Some(mut provider) = lock(&self.provider).take() {
            provider.destroy();
        }
    }

    /// Logs the failure and drops to offline.
    fn degrade(&self, room: &str, reason: &str) {
        warn!("event=peer_sync module=collab status=sync_unavailable room={room} reason={reason}");
        self.destroy_provider();
        self.set_state(SyncState::Offline);
    }

    fn shutdown(&self) {
        if let Some(watchdog) = lock(&self.watchdog).take() {
            watchdog.abort();
        }
        self.destroy_provider();
        self.set_state(SyncState::Offline);
    }
}

struct Session {
    room: String,
    doc: Doc,
    content: TextRef,
    cache: Mutex<Option<CacheBinding>>,
    peer: Arc<PeerSlot>,
}

struct SessionEntry {
    session: Arc<Session>,
    open_count: usize,
}

#[derive(Default)]
struct RoomTable {
    entries: HashMap<String, SessionEntry>,
    /// Teardown count per room. `open` compares it to spot a close it raced.
    closed: HashMap<String, u64>,
}

impl RoomTable {
    fn closed_generation(&self, room: &str) -> u64 {
        self.closed.get(room).copied().unwrap_or(0)
    }

    fn reuse(&mut self, room: &str) -> Option<Arc<Session>> {
        let entry = self.entries.get_mut(room)?;
        entry.open_count += 1;
        debug!(
            "event=session_open module=collab status=reused room={room} open_count={}",
            entry.open_count
        );
        Some(Arc::clone(&entry.session))
    }
}

type SessionTable = Arc<Mutex<RoomTable>>;

/// Opens and reference-counts shared-document sessions.
///
/// Clones share the same session table.
#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
    local_cache: Arc<dyn UpdateLog>,
    connector: Option<Arc<dyn PeerSyncConnector>>,
    runtime: Option<Handle>,
    sessions: SessionTable,
}

impl SessionManager {
    pub fn new(config: SessionConfig, local_cache: Arc<dyn UpdateLog>) -> Self {
        Self {
            config,
            local_cache,
            connector: None,
            runtime: None,
            sessions: Arc::new(Mutex::new(RoomTable::default())),
        }
    }

    /// Peer-sync backend used when `peer_sync_enabled` is set.
    pub fn with_peer_sync(mut self, connector: Arc<dyn PeerSyncConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Runtime for peer-sync work; defaults to the caller's runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Opens `room`, reusing the live session when one exists.
    ///
    /// The cache replay and the peer-sync connect run outside the table
    /// lock. A session built while the room was opened and closed elsewhere
    /// is discarded and rebuilt from the compacted log.
    ///
    /// # Errors
    /// - `PersistenceFailure` when the local cache cannot be attached.
    pub fn open(&self, room: &str) -> Result<SessionHandle, SessionError> {
        loop {
            let generation = {
                let mut table = lock(&self.sessions);
                if let Some(session) = table.reuse(room) {
                    return Ok(SessionHandle::new(session, Arc::clone(&self.sessions)));
                }
                table.closed_generation(room)
            };

            let session = Arc::new(self.build_session(room)?);

            let handle = {
                let mut table = lock(&self.sessions);
                if let Some(existing) = table.reuse(room) {
                    debug!("event=session_open module=collab status=discarded room={room}");
                    return Ok(SessionHandle::new(existing, Arc::clone(&self.sessions)));
                }
                if table.closed_generation(room) != generation {
                    debug!("event=session_open module=collab status=retry room={room}");
                    continue;
                }
                table.entries.insert(
                    room.to_string(),
                    SessionEntry {
                        session: Arc::clone(&session),
                        open_count: 1,
                    },
                );
                SessionHandle::new(Arc::clone(&session), Arc::clone(&self.sessions))
            };

            self.start_peer_sync(&session);
            info!("event=session_open module=collab status=ok room={room} open_count=1");
            return Ok(handle);
        }
    }

    fn build_session(&self, room: &str) -> Result<Session, SessionError> {
        let doc = Doc::new();
        let content = doc.get_or_insert_text(CONTENT_TEXT_NAME);
        let cache = CacheBinding::attach(room, &doc, Arc::clone(&self.local_cache)).map_err(
            |source| {
                warn!("event=session_open module=collab status=error room={room} error={source}");
                SessionError::PersistenceFailure {
                    room: room.to_string(),
                    source,
                }
            },
        )?;
        Ok(Session {
            room: room.to_string(),
            doc,
            content,
            cache: Mutex::new(Some(cache)),
            peer: Arc::new(PeerSlot::offline()),
        })
    }

    pub fn is_open(&self, room: &str) -> bool {
        lock(&self.sessions).entries.contains_key(room)
    }

    /// Number of unreleased handles for `room`; zero when not open.
    pub fn open_count(&self, room: &str) -> usize {
        lock(&self.sessions)
            .entries
            .get(room)
            .map_or(0, |entry| entry.open_count)
    }

    /// Open rooms, sorted.
    pub fn rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = lock(&self.sessions).entries.keys().cloned().collect();
        rooms.sort();
        rooms
    }

    fn start_peer_sync(&self, session: &Session) {
        if !self.config.peer_sync_enabled {
            return;
        }
        let room = session.room.as_str();
        let Some(connector) = self.connector.as_ref() else {
            warn!("event=peer_sync module=collab status=sync_unavailable room={room} reason=no_connector");
            return;
        };
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("event=peer_sync module=collab status=sync_unavailable room={room} reason=no_runtime");
            return;
        };

        let provider = {
            let _entered = runtime.enter();
            connector.connect(room, &session.doc)
        };
        let provider = match provider {
            Ok(provider) => provider,
            Err(err) => {
                session.peer.degrade(room, &err.to_string());
                return;
            }
        };

        let status = provider.status();
        let peer = Arc::clone(&session.peer);
        peer.set_state(SyncState::Connecting);
        *lock(&peer.provider) = Some(provider);
        let watchdog = runtime.spawn(watch_peer_sync(
            room.to_string(),
            Arc::clone(&peer),
            status,
            self.config.connect_timeout,
        ));
        *lock(&peer.watchdog) = Some(watchdog);
    }
}

async fn watch_peer_sync(
    room: String,
    peer: Arc<PeerSlot>,
    mut status: watch::Receiver<PeerStatus>,
    connect_timeout: Duration,
) {
    let connected = tokio::time::timeout(
        connect_timeout,
        status.wait_for(|current| *current != PeerStatus::Connecting),
    )
    .await
    .map(|result| result.map(|current| *current));

    match connected {
        Ok(Ok(PeerStatus::Connected)) => {}
        Ok(Ok(_)) | Ok(Err(_)) => {
            peer.degrade(&room, "disconnected");
            return;
        }
        Err(_) => {
            peer.degrade(&room, "connect_timeout");
            return;
        }
    }

    peer.set_state(SyncState::Online);
    info!("event=peer_sync module=collab status=online room={room}");

    let _ = status
        .wait_for(|current| *current == PeerStatus::Disconnected)
        .await
        .map(|_| ());
    peer.degrade(&room, "disconnected");
}

/// Reference to an open session. Release with [`SessionHandle::dispose`];
/// dropping the handle releases it as well.
pub struct SessionHandle {
    session: Arc<Session>,
    sessions: SessionTable,
    released: bool,
}

impl SessionHandle {
    fn new(session: Arc<Session>, sessions: SessionTable) -> Self {
        Self {
            session,
            sessions,
            released: false,
        }
    }

    pub fn room(&self) -> &str {
        &self.session.room
    }

    pub fn doc(&self) -> &Doc {
        &self.session.doc
    }

    /// Current text of the `content` root.
    pub fn content(&self) -> String {
        let txn = self.session.doc.transact();
        self.session.content.get_string(&txn)
    }

    /// Replaces the content with `text`, editing only the changed middle.
    ///
    /// Read and edit share one transaction, so concurrent writers never see
    /// stale offsets.
    pub fn set_content(&self, text: &str) {
        let content = &self.session.content;
        let mut txn = self.session.doc.transact_mut();
        let current = content.get_string(&txn);
        let (start, removed, inserted) = diff_middle(&current, text);
        if !removed.is_empty() {
            content.remove_range(&mut txn, start, removed.len() as u32);
        }
        if !inserted.is_empty() {
            content.insert(&mut txn, start, inserted);
        }
    }

    pub fn sync_state(&self) -> SyncState {
        *lock(&self.session.peer.state)
    }

    /// Reports a local-cache write failure recorded since the last check.
    pub fn check_persistence(&self) -> Result<(), SessionError> {
        let failure = lock(&self.session.cache)
            .as_ref()
            .and_then(CacheBinding::take_failure);
        match failure {
            Some(source) => Err(SessionError::PersistenceFailure {
                room: self.session.room.clone(),
                source,
            }),
            None => Ok(()),
        }
    }

    /// Releases this handle; the session is torn down with the last one.
    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let room = self.session.room.as_str();
        let mut table = lock(&self.sessions);
        let Some(entry) = table.entries.get_mut(room) else {
            return;
        };
        if !Arc::ptr_eq(&entry.session, &self.session) {
            return;
        }
        entry.open_count -= 1;
        if entry.open_count > 0 {
            debug!(
                "event=session_release module=collab status=ok room={room} open_count={}",
                entry.open_count
            );
            return;
        }

        // Compaction runs under the table lock; a reopen waits for it.
        table.entries.remove(room);
        *table.closed.entry(room.to_string()).or_insert(0) += 1;
        teardown(&self.session);
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn teardown(session: &Session) {
    let room = session.room.as_str();
    session.peer.shutdown();
    if let Some(cache) = lock(&session.cache).take() {
        if let Err(err) = cache.detach(&session.doc) {
            warn!("event=session_teardown module=collab status=cache_error room={room} error={err}");
        }
    }
    info!("event=session_teardown module=collab status=ok room={room}");
}

/// Common prefix/suffix diff of two strings.
///
/// Returns the byte offset of the first difference, the removed slice of
/// `current` and the inserted slice of `next`. Offsets fall on char
/// boundaries.
fn diff_middle<'a>(current: &'a str, next: &'a str) -> (u32, &'a str, &'a str) {
    let prefix: usize = current
        .chars()
        .zip(next.chars())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();

    let current_rest = &current[prefix..];
    let next_rest = &next[prefix..];
    let suffix: usize = current_rest
        .chars()
        .rev()
        .zip(next_rest.chars().rev())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a.len_utf8())
        .sum();

    let removed = &current_rest[..current_rest.len() - suffix];
    let inserted = &next_rest[..next_rest.len() - suffix];
    (prefix as u32, removed, inserted)
}

#[cfg(test)]
mod tests {
    use super::diff_middle;

    #[test]
    fn diff_keeps_common_prefix_and_suffix() {
        assert_eq!(diff_middle("hello world", "hello brave world"), (6, "", "brave "));
        assert_eq!(diff_middle("abc", "abc"), (3, "", ""));
        assert_eq!(diff_middle("abc", ""), (0, "abc", ""));
        assert_eq!(diff_middle("aXa", "aYa"), (1, "X", "Y"));
    }

    #[test]
    fn diff_respects_multibyte_chars() {
        let (start, removed, inserted) = diff_middle("café ok", "café no ok");
        assert_eq!(start, "café ".len() as u32);
        assert_eq!(removed, "");
        assert_eq!(inserted, "no ");
    }
}
