//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted note record and the draft used to create one.
//! - Provide lifecycle helpers that enforce timestamp invariants.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `updated_at` never moves backwards across mutations of one note.
//! - `created_at <= updated_at`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a note.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = Uuid;

/// Title assigned when a note is created without one.
pub const DEFAULT_NOTE_TITLE: &str = "Untitled Note";

/// Persisted unit of user content.
///
/// Serialized with camelCase keys so stored records keep the
/// `{id, title, content, createdAt, updatedAt}` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Generated once at creation.
    pub id: NoteId,
    pub title: String,
    /// Serialized rich-text document (editor HTML).
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a note with a caller-provided id and both timestamps at `now`.
    pub fn with_id(
        id: NoteId,
        title: impl Into<String>,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Refreshes `updated_at`, clamping so it never decreases.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    /// Replaces content and optionally title, then refreshes `updated_at`.
    pub fn apply_edit(&mut self, content: impl Into<String>, title: Option<&str>, now: DateTime<Utc>) {
        self.content = content.into();
        if let Some(title) = title {
            self.title = title.to_string();
        }
        self.touch(now);
    }
}

/// Caller input for creating a note; the store assigns id and timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    /// Draft with the default title and empty content.
    pub fn untitled() -> Self {
        Self::new(DEFAULT_NOTE_TITLE, "")
    }
}

/// Resolves an optional user title to the stored title.
///
/// Blank titles fall back to [`DEFAULT_NOTE_TITLE`].
pub fn resolve_title(title: Option<&str>) -> String {
    match title.map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => DEFAULT_NOTE_TITLE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_title, Note, DEFAULT_NOTE_TITLE};
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn touch_never_moves_updated_at_backwards() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut note = Note::with_id(Uuid::new_v4(), "Groceries", "", t0);

        note.touch(t0 - Duration::seconds(30));
        assert_eq!(note.updated_at, t0);

        note.touch(t0 + Duration::seconds(1));
        assert_eq!(note.updated_at, t0 + Duration::seconds(1));
        assert!(note.created_at <= note.updated_at);
    }

    #[test]
    fn apply_edit_keeps_title_when_not_provided() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let mut note = Note::with_id(Uuid::new_v4(), "Groceries", "", t0);
        note.apply_edit("<p>Milk</p>", None, t0 + Duration::seconds(1));
        assert_eq!(note.title, "Groceries");
        assert_eq!(note.content, "<p>Milk</p>");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let note = Note::with_id(Uuid::nil(), "a", "b", t0);
        let json = serde_json::to_value(&note).unwrap();
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("created_at").is_none());
    }

    #[test]
    fn blank_titles_resolve_to_default() {
        assert_eq!(resolve_title(None), DEFAULT_NOTE_TITLE);
        assert_eq!(resolve_title(Some("   ")), DEFAULT_NOTE_TITLE);
        assert_eq!(resolve_title(Some(" Plan ")), "Plan");
    }
}
