use quillnote_core::db::open_db;
use quillnote_core::collab::local_cache::UpdateLogResult;
use quillnote_core::{
    MemoryUpdateLog, PeerStatus, PeerSyncConnector, PeerSyncProvider, SessionConfig,
    SessionError, SessionHandle, SessionManager, SqliteUpdateLog, SyncError, SyncState,
    UpdateLog,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::sync::watch;
use yrs::updates::decoder::Decode;
use yrs::{Doc, GetString, Transact, Update};

#[derive(Clone, Copy)]
enum Behavior {
    Connect,
    Hang,
    Fail,
}

struct MockConnector {
    behavior: Behavior,
    connects: AtomicUsize,
    destroyed: Arc<AtomicUsize>,
    senders: Mutex<Vec<Arc<watch::Sender<PeerStatus>>>>,
}

impl MockConnector {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            connects: AtomicUsize::new(0),
            destroyed: Arc::new(AtomicUsize::new(0)),
            senders: Mutex::new(Vec::new()),
        })
    }

    fn destroyed(&self) -> usize {
        self.destroyed.load(Ordering::SeqCst)
    }

    fn push_status(&self, status: PeerStatus) {
        for sender in self.senders.lock().unwrap().iter() {
            let _ = sender.send(status);
        }
    }
}

struct MockProvider {
    status: Arc<watch::Sender<PeerStatus>>,
    destroyed: Arc<AtomicUsize>,
    alive: bool,
}

impl PeerSyncProvider for MockProvider {
    fn status(&self) -> watch::Receiver<PeerStatus> {
        self.status.subscribe()
    }

    fn destroy(&mut self) {
        if self.alive {
            self.alive = false;
            self.destroyed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl PeerSyncConnector for MockConnector {
    fn connect(&self, _room: &str, _doc: &Doc) -> Result<Box<dyn PeerSyncProvider>, SyncError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let initial = match self.behavior {
            Behavior::Fail => return Err(SyncError::Transport("refused".to_string())),
            Behavior::Connect => PeerStatus::Connected,
            Behavior::Hang => PeerStatus::Connecting,
        };
        let (sender, _receiver) = watch::channel(initial);
        let sender = Arc::new(sender);
        self.senders.lock().unwrap().push(Arc::clone(&sender));
        Ok(Box::new(MockProvider {
            status: sender,
            destroyed: Arc::clone(&self.destroyed),
            alive: true,
        }))
    }
}

type Hook = Box<dyn FnOnce() + Send>;

/// Memory log that runs a one-shot hook after a load or before a compaction.
#[derive(Default)]
struct HookedLog {
    inner: MemoryUpdateLog,
    after_load: Mutex<Option<Hook>>,
    before_compact: Mutex<Option<Hook>>,
}

impl HookedLog {
    fn run(slot: &Mutex<Option<Hook>>) {
        let hook = slot.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

impl UpdateLog for HookedLog {
    fn load_updates(&self, room: &str) -> UpdateLogResult<Vec<Vec<u8>>> {
        let updates = self.inner.load_updates(room)?;
        Self::run(&self.after_load);
        Ok(updates)
    }

    fn append_update(&self, room: &str, update: &[u8]) -> UpdateLogResult<()> {
        self.inner.append_update(room, update)
    }

    fn compact(&self, room: &str, snapshot: &[u8]) -> UpdateLogResult<()> {
        Self::run(&self.before_compact);
        self.inner.compact(room, snapshot)
    }
}

/// Text a fresh document shows after replaying the room's durable log.
fn replay(log: &dyn UpdateLog, room: &str) -> String {
    let doc = Doc::new();
    let content = doc.get_or_insert_text("content");
    {
        let mut txn = doc.transact_mut();
        for bytes in log.load_updates(room).unwrap() {
            txn.apply_update(Update::decode_v1(&bytes).unwrap()).unwrap();
        }
    }
    let txn = doc.transact();
    content.get_string(&txn)
}

fn peer_config(timeout_ms: u64) -> SessionConfig {
    SessionConfig {
        peer_sync_enabled: true,
        connect_timeout: Duration::from_millis(timeout_ms),
    }
}

async fn wait_for_state(handle: &SessionHandle, expected: SyncState) -> bool {
    for _ in 0..200 {
        if handle.sync_state() == expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[test]
fn peer_sync_is_off_by_default() {
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(MemoryUpdateLog::new()));
    let handle = manager.open("room-1").unwrap();
    assert_eq!(handle.sync_state(), SyncState::Offline);
    assert_eq!(handle.content(), "");
    assert_eq!(handle.room(), "room-1");
}

#[test]
fn same_room_shares_one_document_until_last_release() {
    let log = Arc::new(MemoryUpdateLog::new());
    let manager = SessionManager::new(SessionConfig::default(), log.clone());

    let first = manager.open("groceries").unwrap();
    let second = manager.open("groceries").unwrap();
    assert_eq!(manager.open_count("groceries"), 2);

    first.set_content("Milk");
    assert_eq!(second.content(), "Milk");
    second.set_content("Milk and eggs");
    assert_eq!(first.content(), "Milk and eggs");
    assert!(log.update_count("groceries") >= 2);

    first.dispose();
    assert!(manager.is_open("groceries"));
    assert_eq!(manager.open_count("groceries"), 1);
    assert_eq!(second.content(), "Milk and eggs");

    drop(second);
    assert!(!manager.is_open("groceries"));
    assert_eq!(manager.open_count("groceries"), 0);
    assert_eq!(log.update_count("groceries"), 1);
}

#[test]
fn rooms_are_isolated_and_listed() {
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(MemoryUpdateLog::new()));
    let a = manager.open("b-room").unwrap();
    let b = manager.open("a-room").unwrap();
    a.set_content("one");
    assert_eq!(b.content(), "");
    assert_eq!(manager.rooms(), vec!["a-room".to_string(), "b-room".to_string()]);

    let clone = manager.clone();
    drop(a);
    assert_eq!(clone.rooms(), vec!["a-room".to_string()]);
    drop(b);
}

#[test]
fn content_survives_manager_restart_through_sqlite_cache() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("quillnote.sqlite3");

    {
        let log = Arc::new(SqliteUpdateLog::new(open_db(&path).unwrap()));
        let manager = SessionManager::new(SessionConfig::default(), log);
        let handle = manager.open("note-room").unwrap();
        handle.set_content("hello world");
        handle.set_content("hello brave world");
        handle.dispose();
    }

    let log = Arc::new(SqliteUpdateLog::new(open_db(&path).unwrap()));
    let manager = SessionManager::new(SessionConfig::default(), log.clone());
    let handle = manager.open("note-room").unwrap();
    assert_eq!(handle.content(), "hello brave world");
    assert_eq!(log.update_count("note-room").unwrap(), 1);
}

#[test]
fn cache_attach_failure_fails_open_without_registering() {
    let log = Arc::new(MemoryUpdateLog::new());
    log.set_unavailable(true);
    let manager = SessionManager::new(SessionConfig::default(), log.clone());

    match manager.open("room") {
        Err(SessionError::PersistenceFailure { room, .. }) => assert_eq!(room, "room"),
        Ok(_) => panic!("open should fail"),
    }
    assert!(!manager.is_open("room"));

    log.set_unavailable(false);
    assert!(manager.open("room").is_ok());
}

#[test]
fn cache_write_failure_is_reported_once() {
    let log = Arc::new(MemoryUpdateLog::new());
    let manager = SessionManager::new(SessionConfig::default(), log.clone());
    let handle = manager.open("room").unwrap();

    log.set_unavailable(true);
    handle.set_content("unsaved");
    assert!(matches!(
        handle.check_persistence(),
        Err(SessionError::PersistenceFailure { .. })
    ));
    assert!(handle.check_persistence().is_ok());
    log.set_unavailable(false);
}

#[test]
fn concurrent_set_content_on_two_threads_never_corrupts_the_document() {
    let manager = SessionManager::new(SessionConfig::default(), Arc::new(MemoryUpdateLog::new()));
    let local = manager.open("room").unwrap();
    let remote = manager.open("room").unwrap();

    let writer = thread::spawn(move || {
        for i in 0..5_000 {
            remote.set_content(if i % 2 == 0 { "a much longer line of text" } else { "tiny" });
        }
        remote
    });
    for i in 0..5_000 {
        local.set_content(if i % 2 == 0 { "short" } else { "another fairly long sentence" });
    }
    let remote = writer.join().unwrap();

    local.set_content("settled");
    assert_eq!(local.content(), "settled");
    assert_eq!(remote.content(), "settled");
}

#[test]
fn reopen_during_teardown_keeps_new_edits_in_the_durable_log() {
    let log = Arc::new(HookedLog::default());
    let manager = SessionManager::new(SessionConfig::default(), log.clone());
    let first = manager.open("room").unwrap();
    first.set_content("old");

    let (sender, receiver) = mpsc::channel();
    let reopener = manager.clone();
    *log.before_compact.lock().unwrap() = Some(Box::new(move || {
        thread::spawn(move || {
            let second = reopener.open("room").unwrap();
            second.set_content("old + typed by second opener");
            sender.send(second).unwrap();
        });
        thread::sleep(Duration::from_millis(50));
    }));
    first.dispose();

    let second = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(second.content(), "old + typed by second opener");
    assert_eq!(replay(&log.inner, "room"), "old + typed by second opener");
    assert_eq!(manager.open_count("room"), 1);
    drop(second);
}

#[test]
fn open_rebuilds_when_the_room_closed_during_its_replay() {
    let log = Arc::new(HookedLog::default());
    let manager = SessionManager::new(SessionConfig::default(), log.clone());

    let other = manager.clone();
    *log.after_load.lock().unwrap() = Some(Box::new(move || {
        thread::spawn(move || {
            let quick = other.open("room").unwrap();
            quick.set_content("written during the slow replay");
            quick.dispose();
        })
        .join()
        .unwrap();
    }));

    let slow = manager.open("room").unwrap();
    assert_eq!(slow.content(), "written during the slow replay");
    assert_eq!(manager.open_count("room"), 1);
}

#[test]
fn explicit_runtime_drives_peer_sync_for_callers_outside_tokio() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    let connector = MockConnector::new(Behavior::Connect);
    let manager = SessionManager::new(peer_config(1000), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone())
        .with_runtime(runtime.handle().clone());

    let handle = manager.open("room").unwrap();
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);

    let mut online = false;
    for _ in 0..200 {
        if handle.sync_state() == SyncState::Online {
            online = true;
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    assert!(online);

    handle.dispose();
    assert_eq!(connector.destroyed(), 1);
    assert_eq!(manager.open_count("room"), 0);
}

#[test]
fn enabled_peer_sync_without_runtime_stays_offline() {
    let connector = MockConnector::new(Behavior::Connect);
    let manager = SessionManager::new(peer_config(100), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone());

    let handle = manager.open("room").unwrap();
    assert_eq!(handle.sync_state(), SyncState::Offline);
    assert_eq!(connector.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn connected_provider_goes_online_and_is_destroyed_at_teardown() {
    let connector = MockConnector::new(Behavior::Connect);
    let manager = SessionManager::new(peer_config(1000), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone());

    let first = manager.open("room").unwrap();
    let second = manager.open("room").unwrap();
    assert_eq!(connector.connects.load(Ordering::SeqCst), 1);
    assert!(wait_for_state(&first, SyncState::Online).await);

    first.dispose();
    assert_eq!(connector.destroyed(), 0);
    assert_eq!(second.sync_state(), SyncState::Online);

    second.dispose();
    assert_eq!(connector.destroyed(), 1);
}

#[tokio::test]
async fn connect_timeout_degrades_to_offline() {
    let connector = MockConnector::new(Behavior::Hang);
    let manager = SessionManager::new(peer_config(50), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone());

    let handle = manager.open("room").unwrap();
    assert_eq!(handle.sync_state(), SyncState::Connecting);
    assert!(wait_for_state(&handle, SyncState::Offline).await);
    assert_eq!(connector.destroyed(), 1);

    handle.set_content("still editable offline");
    assert_eq!(handle.content(), "still editable offline");
    handle.dispose();
    assert_eq!(connector.destroyed(), 1);
}

#[tokio::test]
async fn connector_error_never_fails_open() {
    let connector = MockConnector::new(Behavior::Fail);
    let manager = SessionManager::new(peer_config(50), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone());

    let handle = manager.open("room").unwrap();
    assert_eq!(handle.sync_state(), SyncState::Offline);
    assert_eq!(connector.destroyed(), 0);
}

#[tokio::test]
async fn disconnect_after_online_degrades_to_offline() {
    let connector = MockConnector::new(Behavior::Connect);
    let manager = SessionManager::new(peer_config(1000), Arc::new(MemoryUpdateLog::new()))
        .with_peer_sync(connector.clone());

    let handle = manager.open("room").unwrap();
    assert!(wait_for_state(&handle, SyncState::Online).await);

    connector.push_status(PeerStatus::Disconnected);
    assert!(wait_for_state(&handle, SyncState::Offline).await);
    assert_eq!(connector.destroyed(), 1);
}
