//! Observable note collection persisted under a single key.
//!
//! # Responsibility
//! - Own the note collection and expose add/update/delete use-cases.
//! - Persist the whole collection on every effective mutation.
//! - Notify observers synchronously with the post-mutation snapshot.
//!
//! # Invariants
//! - Only this store mutates the collection.
//! - A mutation commits in memory only after persistence succeeded; a failed
//!   write leaves state and observers untouched.
//! - Ids are never reused for the lifetime of the store, including ids of
//!   deleted notes.
//! - Updates and deletes of absent ids are no-ops: no write, no notification.

use crate::clock::Clock;
use crate::editor::binding::{ChangeKind, EditorChange};
use crate::kv::{KeyValueStore, KvError};
use crate::model::note::{Note, NoteDraft, NoteId};
use crate::preview::derive_content_preview;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Storage key holding the serialized collection.
pub const COLLECTION_KEY: &str = "note-storage";
/// Key receiving an unreadable collection before the store starts empty.
pub const CORRUPT_BACKUP_KEY: &str = "note-storage.corrupt";
/// Envelope version written with the collection.
pub const COLLECTION_VERSION: u32 = 0;

/// Reactive store error.
#[derive(Debug)]
pub enum NoteStoreError {
    /// Storage medium rejected a read or write.
    StorageFailure(KvError),
    /// Collection could not be encoded as JSON.
    Serialize(serde_json::Error),
}

impl Display for NoteStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageFailure(err) => write!(f, "note storage failure: {err}"),
            Self::Serialize(err) => write!(f, "failed to serialize notes: {err}"),
        }
    }
}

impl Error for NoteStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageFailure(err) => Some(err),
            Self::Serialize(err) => Some(err),
        }
    }
}

impl From<KvError> for NoteStoreError {
    fn from(value: KvError) -> Self {
        Self::StorageFailure(value)
    }
}

pub type NoteStoreResult<T> = Result<T, NoteStoreError>;

/// Handle returned by [`NoteStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// List-view projection of one note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: NoteId,
    pub title: String,
    pub preview_text: Option<String>,
    pub preview_image: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl NoteSummary {
    fn from_note(note: &Note) -> Self {
        let preview = derive_content_preview(&note.content);
        Self {
            id: note.id,
            title: note.title.clone(),
            preview_text: preview.preview_text,
            preview_image: preview.preview_image,
            updated_at: note.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct StoredCollection {
    state: StoredState,
    #[serde(default)]
    version: u32,
}

#[derive(Deserialize)]
struct StoredState {
    #[serde(default)]
    notes: Vec<Note>,
}

#[derive(Serialize)]
struct CollectionRef<'a> {
    state: StateRef<'a>,
    version: u32,
}

#[derive(Serialize)]
struct StateRef<'a> {
    notes: &'a [Note],
}

type Observer = Box<dyn FnMut(&[Note])>;

/// Process-local reactive container over the note collection.
pub struct NoteStore<S: KeyValueStore> {
    storage: S,
    clock: Arc<dyn Clock>,
    notes: Vec<Note>,
    issued_ids: HashSet<NoteId>,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl<S: KeyValueStore> NoteStore<S> {
    /// Loads the persisted collection from `storage`.
    ///
    /// An unreadable collection is copied to [`CORRUPT_BACKUP_KEY`] and the
    /// store starts empty. Storage-medium failures are returned.
    pub fn open(mut storage: S, clock: Arc<dyn Clock>) -> NoteStoreResult<Self> {
        let notes = match storage.get(COLLECTION_KEY)? {
            None => Vec::new(),
            Some(raw) => match serde_json::from_str::<StoredCollection>(&raw) {
                Ok(stored) => {
                    if stored.version != COLLECTION_VERSION {
                        warn!(
                            "event=store_open module=note_store status=warn stored_version={} expected_version={}",
                            stored.version, COLLECTION_VERSION
                        );
                    }
                    stored.state.notes
                }
                Err(err) => {
                    error!(
                        "event=store_open module=note_store status=corrupt error_code=corruption error={}",
                        err
                    );
                    storage.set(CORRUPT_BACKUP_KEY, &raw)?;
                    Vec::new()
                }
            },
        };

        info!(
            "event=store_open module=note_store status=ok count={}",
            notes.len()
        );
        let issued_ids = notes.iter().map(|note| note.id).collect();
        Ok(Self {
            storage,
            clock,
            notes,
            issued_ids,
            observers: Vec::new(),
            next_subscription: 0,
        })
    }

    /// Current collection in insertion order.
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Finds one note by id.
    pub fn find(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Notes ordered by `updated_at DESC, id ASC`.
    pub fn recent(&self) -> Vec<&Note> {
        let mut sorted: Vec<&Note> = self.notes.iter().collect();
        sorted.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        sorted
    }

    /// List-view summaries, most recently updated first.
    pub fn summaries(&self) -> Vec<NoteSummary> {
        self.recent()
            .into_iter()
            .map(NoteSummary::from_note)
            .collect()
    }

    /// Case-insensitive match on title or preview text.
    ///
    /// A blank query returns every summary.
    pub fn search(&self, query: &str) -> Vec<NoteSummary> {
        let needle = query.trim().to_lowercase();
        self.summaries()
            .into_iter()
            .filter(|summary| {
                needle.is_empty()
                    || summary.title.to_lowercase().contains(&needle)
                    || summary
                        .preview_text
                        .as_deref()
                        .is_some_and(|text| text.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Creates a note with a fresh id and `created_at == updated_at == now`.
    pub fn add_note(&mut self, draft: NoteDraft) -> NoteStoreResult<Note> {
        let id = self.fresh_id();
        let note = Note::with_id(id, draft.title, draft.content, self.clock.now());

        let mut next = self.notes.clone();
        next.push(note.clone());
        self.commit(next)?;
        self.issued_ids.insert(id);

        info!("event=note_add module=note_store status=ok note_id={id}");
        Ok(note)
    }

    /// Replaces content and optionally title of an existing note.
    ///
    /// Returns `None` when `id` is absent (for example when navigation raced
    /// with deletion).
    pub fn update_note(
        &mut self,
        id: NoteId,
        content: &str,
        title: Option<&str>,
    ) -> NoteStoreResult<Option<Note>> {
        let Some(index) = self.position(id) else {
            debug!("event=note_update module=note_store status=skipped reason=not_found note_id={id}");
            return Ok(None);
        };

        let mut next = self.notes.clone();
        next[index].apply_edit(content, title, self.clock.now());
        let updated = next[index].clone();
        self.commit(next)?;

        debug!("event=note_update module=note_store status=ok note_id={id}");
        Ok(Some(updated))
    }

    /// Changes only the title of an existing note.
    pub fn rename_note(&mut self, id: NoteId, title: &str) -> NoteStoreResult<Option<Note>> {
        let Some(content) = self.find(id).map(|note| note.content.clone()) else {
            return Ok(None);
        };
        self.update_note(id, &content, Some(title))
    }

    /// Removes a note. Returns `false` when it was already absent.
    pub fn delete_note(&mut self, id: NoteId) -> NoteStoreResult<bool> {
        let Some(index) = self.position(id) else {
            debug!("event=note_delete module=note_store status=skipped reason=not_found note_id={id}");
            return Ok(false);
        };

        let mut next = self.notes.clone();
        next.remove(index);
        self.commit(next)?;

        info!("event=note_delete module=note_store status=ok note_id={id}");
        Ok(true)
    }

    /// Applies one editor change event.
    pub fn apply(&mut self, change: EditorChange) -> NoteStoreResult<Option<Note>> {
        match change.kind {
            ChangeKind::Content(content) => self.update_note(change.note_id, &content, None),
            ChangeKind::Title(title) => self.rename_note(change.note_id, &title),
        }
    }

    /// Registers an observer called after every effective mutation.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&[Note]) + 'static,
    {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Removes an observer. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns the underlying medium.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|note| note.id == id)
    }

    fn fresh_id(&self) -> NoteId {
        loop {
            let candidate = Uuid::new_v4();
            if !self.issued_ids.contains(&candidate) {
                return candidate;
            }
        }
    }

    fn commit(&mut self, next: Vec<Note>) -> NoteStoreResult<()> {
        let payload = serde_json::to_string(&CollectionRef {
            state: StateRef { notes: &next },
            version: COLLECTION_VERSION,
        })
        .map_err(NoteStoreError::Serialize)?;

        if let Err(err) = self.storage.set(COLLECTION_KEY, &payload) {
            error!(
                "event=store_persist module=note_store status=error error_code=storage_failure count={} error={}",
                next.len(),
                err
            );
            return Err(NoteStoreError::StorageFailure(err));
        }

        self.notes = next;
        for (_, observer) in &mut self.observers {
            observer(&self.notes);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{NoteStore, COLLECTION_KEY};
    use crate::clock::SystemClock;
    use crate::kv::{KeyValueStore, MemoryKvStore};
    use crate::model::note::NoteDraft;
    use std::sync::Arc;

    #[test]
    fn persists_versioned_envelope() {
        let mut store = NoteStore::open(MemoryKvStore::new(), Arc::new(SystemClock)).unwrap();
        store.add_note(NoteDraft::new("Groceries", "")).unwrap();

        let raw = store.storage().get(COLLECTION_KEY).unwrap().unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["version"], 0);
        assert_eq!(json["state"]["notes"][0]["title"], "Groceries");
    }

    #[test]
    fn unsubscribe_reports_unknown_ids() {
        let mut store = NoteStore::open(MemoryKvStore::new(), Arc::new(SystemClock)).unwrap();
        let id = store.subscribe(|_| {});
        assert_eq!(store.subscriber_count(), 1);
        assert!(store.unsubscribe(id));
        assert!(!store.unsubscribe(id));
    }
}
