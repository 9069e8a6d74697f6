//! One-directional data flow between an editor view and the note store.
//!
//! Edits leave the view as [`EditorChange`] events, the store applies them
//! and republishes a snapshot, and [`EditorBinding::on_snapshot`] decides
//! whether the view needs to re-render. The binding remembers what the view
//! already shows, so a snapshot carrying the view's own edit never rewrites
//! the editor content underneath the cursor.

use crate::model::note::{Note, NoteId};

/// What an editor change modifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Content(String),
    Title(String),
}

/// Edit event produced by an editor view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorChange {
    pub note_id: NoteId,
    pub kind: ChangeKind,
}

impl EditorChange {
    pub fn content(note_id: NoteId, content: impl Into<String>) -> Self {
        Self {
            note_id,
            kind: ChangeKind::Content(content.into()),
        }
    }

    pub fn title(note_id: NoteId, title: impl Into<String>) -> Self {
        Self {
            note_id,
            kind: ChangeKind::Title(title.into()),
        }
    }
}

/// Reaction to a store snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    /// The view already shows this state.
    Unchanged,
    /// The view must show new title and/or content.
    Render { title: String, content: String },
    /// The note is gone; the view should leave the editor.
    Missing,
}

/// Per-view state for one open note.
#[derive(Debug, Clone)]
pub struct EditorBinding {
    note_id: NoteId,
    shown_title: Option<String>,
    shown_content: Option<String>,
}

impl EditorBinding {
    pub fn new(note_id: NoteId) -> Self {
        Self {
            note_id,
            shown_title: None,
            shown_content: None,
        }
    }

    pub fn note_id(&self) -> NoteId {
        self.note_id
    }

    /// Records user-typed content and returns the event to send to the store.
    ///
    /// Returns `None` when the content equals what is already shown.
    pub fn content_edited(&mut self, content: &str) -> Option<EditorChange> {
        if self.shown_content.as_deref() == Some(content) {
            return None;
        }
        self.shown_content = Some(content.to_string());
        Some(EditorChange::content(self.note_id, content))
    }

    /// Records a user-typed title and returns the event to send to the store.
    pub fn title_edited(&mut self, title: &str) -> Option<EditorChange> {
        if self.shown_title.as_deref() == Some(title) {
            return None;
        }
        self.shown_title = Some(title.to_string());
        Some(EditorChange::title(self.note_id, title))
    }

    /// Compares a store snapshot with what the view shows.
    pub fn on_snapshot(&mut self, notes: &[Note]) -> ViewUpdate {
        let Some(note) = notes.iter().find(|note| note.id == self.note_id) else {
            return ViewUpdate::Missing;
        };

        let same_title = self.shown_title.as_deref() == Some(note.title.as_str());
        let same_content = self.shown_content.as_deref() == Some(note.content.as_str());
        if same_title && same_content {
            return ViewUpdate::Unchanged;
        }

        self.shown_title = Some(note.title.clone());
        self.shown_content = Some(note.content.clone());
        ViewUpdate::Render {
            title: note.title.clone(),
            content: note.content.clone(),
        }
    }
}
