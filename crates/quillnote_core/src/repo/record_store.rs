//! Per-note record persistence on a key-value medium.
//!
//! # Responsibility
//! - Persist each note as one JSON record under `note-<id>`.
//! - Tolerate corrupt records: single loads report absence, scans skip them.
//!
//! # Invariants
//! - Keys are always `note-` followed by the hyphenated note id.
//! - Keys under the prefix whose suffix is not a note id (for example the
//!   collection key `note-storage`) are not note records and are ignored.
//! - `list_all` is ordered by `updated_at DESC, id ASC`.

use crate::clock::Clock;
use crate::kv::{KeyValueStore, KvError};
use crate::model::note::{resolve_title, Note, NoteId};
use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Key prefix for per-note records.
pub const NOTE_KEY_PREFIX: &str = "note-";

pub type RecordResult<T> = Result<T, RecordStoreError>;

/// Record store error.
#[derive(Debug)]
pub enum RecordStoreError {
    /// Storage medium rejected a read or write.
    StorageFailure { key: String, source: KvError },
    /// Note could not be encoded as JSON.
    Serialize(serde_json::Error),
    /// Stored record failed to decode.
    ///
    /// Never returned by public operations; logged and mapped to absence.
    Corruption { key: String, reason: String },
}

impl Display for RecordStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StorageFailure { key, source } => {
                write!(f, "storage failure for `{key}`: {source}")
            }
            Self::Serialize(err) => write!(f, "failed to serialize note: {err}"),
            Self::Corruption { key, reason } => write!(f, "corrupt note record `{key}`: {reason}"),
        }
    }
}

impl Error for RecordStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::StorageFailure { source, .. } => Some(source),
            Self::Serialize(err) => Some(err),
            Self::Corruption { .. } => None,
        }
    }
}

/// Returns the storage key for one note.
pub fn note_key(id: NoteId) -> String {
    format!("{NOTE_KEY_PREFIX}{id}")
}

/// Parses a storage key back to a note id, if it is a note record key.
pub fn parse_note_key(key: &str) -> Option<NoteId> {
    let suffix = key.strip_prefix(NOTE_KEY_PREFIX)?;
    Uuid::parse_str(suffix).ok()
}

/// Note records stored one-per-key.
pub struct NoteRecordStore<S: KeyValueStore> {
    storage: S,
    clock: Arc<dyn Clock>,
}

impl<S: KeyValueStore> NoteRecordStore<S> {
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    /// Writes the note under its key, replacing any previous record.
    pub fn save(&mut self, note: &Note) -> RecordResult<()> {
        let key = note_key(note.id);
        let payload = serde_json::to_string(note).map_err(RecordStoreError::Serialize)?;
        self.storage.set(&key, &payload).map_err(|source| {
            error!(
                "event=note_save module=record_store status=error error_code=storage_failure note_id={} error={}",
                note.id, source
            );
            RecordStoreError::StorageFailure {
                key: key.clone(),
                source,
            }
        })?;
        debug!(
            "event=note_save module=record_store status=ok note_id={} bytes={}",
            note.id,
            payload.len()
        );
        Ok(())
    }

    /// Reads one note; `None` when missing or corrupt.
    pub fn load(&self, id: NoteId) -> RecordResult<Option<Note>> {
        let key = note_key(id);
        let Some(raw) = self.read(&key)? else {
            return Ok(None);
        };

        match decode_record(&key, &raw) {
            Ok(note) => Ok(Some(note)),
            Err(err) => {
                warn!(
                    "event=note_load module=record_store status=corrupt error_code=corruption key={} error={}",
                    key, err
                );
                Ok(None)
            }
        }
    }

    /// Removes one note record. Missing records are not an error.
    pub fn delete(&mut self, id: NoteId) -> RecordResult<()> {
        let key = note_key(id);
        self.storage
            .remove(&key)
            .map_err(|source| RecordStoreError::StorageFailure { key, source })?;
        debug!("event=note_delete module=record_store status=ok note_id={id}");
        Ok(())
    }

    /// Scans all note records, most recently updated first.
    ///
    /// Corrupt records are skipped and logged; they never abort the scan.
    pub fn list_all(&self) -> RecordResult<Vec<Note>> {
        let keys = self
            .storage
            .keys_with_prefix(NOTE_KEY_PREFIX)
            .map_err(|source| RecordStoreError::StorageFailure {
                key: format!("{NOTE_KEY_PREFIX}*"),
                source,
            })?;

        let mut notes = Vec::with_capacity(keys.len());
        let mut skipped = 0usize;
        for key in keys {
            if parse_note_key(&key).is_none() {
                continue;
            }
            let Some(raw) = self.read(&key)? else {
                continue;
            };
            match decode_record(&key, &raw) {
                Ok(note) => notes.push(note),
                Err(err) => {
                    skipped += 1;
                    warn!(
                        "event=note_list module=record_store status=corrupt error_code=corruption key={} error={}",
                        key, err
                    );
                }
            }
        }

        sort_by_recent(&mut notes);
        info!(
            "event=note_list module=record_store status=ok count={} skipped={}",
            notes.len(),
            skipped
        );
        Ok(notes)
    }

    /// Creates, persists and returns a new empty note.
    ///
    /// `None` or blank titles become "Untitled Note".
    pub fn create(&mut self, title: Option<&str>) -> RecordResult<Note> {
        let mut id = Uuid::new_v4();
        while self.read(&note_key(id))?.is_some() {
            id = Uuid::new_v4();
        }
        let note = Note::with_id(id, resolve_title(title), "", self.clock.now());
        self.save(&note)?;
        info!("event=note_create module=record_store status=ok note_id={id}");
        Ok(note)
    }

    /// Replaces content (and optionally title) of an existing record.
    ///
    /// Returns `None` when the record is missing or corrupt.
    pub fn update(
        &mut self,
        id: NoteId,
        content: &str,
        title: Option<&str>,
    ) -> RecordResult<Option<Note>> {
        let Some(mut note) = self.load(id)? else {
            return Ok(None);
        };
        note.apply_edit(content, title, self.clock.now());
        self.save(&note)?;
        Ok(Some(note))
    }

    /// Returns the underlying medium.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    fn read(&self, key: &str) -> RecordResult<Option<String>> {
        self.storage
            .get(key)
            .map_err(|source| RecordStoreError::StorageFailure {
                key: key.to_string(),
                source,
            })
    }
}

/// Sorts notes by `updated_at DESC, id ASC`.
pub fn sort_by_recent(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    });
}

fn decode_record(key: &str, raw: &str) -> Result<Note, RecordStoreError> {
    let note: Note = serde_json::from_str(raw).map_err(|err| RecordStoreError::Corruption {
        key: key.to_string(),
        reason: err.to_string(),
    })?;
    if note_key(note.id) != key {
        return Err(RecordStoreError::Corruption {
            key: key.to_string(),
            reason: format!("record id {} does not match its key", note.id),
        });
    }
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::{note_key, parse_note_key, NOTE_KEY_PREFIX};
    use uuid::Uuid;

    #[test]
    fn note_keys_round_trip_and_reject_collection_key() {
        let id = Uuid::new_v4();
        assert_eq!(parse_note_key(&note_key(id)), Some(id));
        assert_eq!(parse_note_key("note-storage"), None);
        assert_eq!(parse_note_key("other-key"), None);
        assert!(note_key(id).starts_with(NOTE_KEY_PREFIX));
    }
}
