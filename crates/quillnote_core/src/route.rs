//! Navigation routes.
//!
//! `/` shows the note list, `/notes/<uuid>` opens the editor and anything
//! else is not found. [`resolve`] sends editor routes for notes that no
//! longer exist back to the list.

use crate::model::note::{Note, NoteId};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NOTES_PREFIX: &str = "/notes/";

/// Parsed route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    NoteList,
    Editor(NoteId),
    NotFound,
}

impl Route {
    /// Parses a path. Query strings and fragments are ignored, as is one
    /// trailing slash.
    pub fn parse(path: &str) -> Self {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim();
        let path = if path.len() > 1 {
            path.strip_suffix('/').unwrap_or(path)
        } else {
            path
        };

        if path == "/" || path.is_empty() {
            return Self::NoteList;
        }
        match path.strip_prefix(NOTES_PREFIX) {
            Some(id) if !id.contains('/') => Uuid::parse_str(id)
                .map(Self::Editor)
                .unwrap_or(Self::NotFound),
            _ => Self::NotFound,
        }
    }

    pub fn path(&self) -> String {
        self.to_string()
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteList => write!(f, "/"),
            Self::Editor(id) => write!(f, "{NOTES_PREFIX}{id}"),
            Self::NotFound => write!(f, "/404"),
        }
    }
}

/// Parses `path` and redirects editor routes for missing notes to the list.
pub fn resolve(path: &str, notes: &[Note]) -> Route {
    match Route::parse(path) {
        Route::Editor(id) if !notes.iter().any(|note| note.id == id) => Route::NoteList,
        route => route,
    }
}

#[cfg(test)]
mod tests {
    use super::Route;
    use uuid::Uuid;

    #[test]
    fn parses_known_paths() {
        let id = Uuid::new_v4();
        assert_eq!(Route::parse("/"), Route::NoteList);
        assert_eq!(Route::parse(""), Route::NoteList);
        assert_eq!(Route::parse(&format!("/notes/{id}")), Route::Editor(id));
        assert_eq!(Route::parse(&format!("/notes/{id}/")), Route::Editor(id));
        assert_eq!(Route::parse(&format!("/notes/{id}?tab=1")), Route::Editor(id));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        assert_eq!(Route::parse("/notes/"), Route::NotFound);
        assert_eq!(Route::parse("/notes/not-a-uuid"), Route::NotFound);
        assert_eq!(Route::parse("/settings"), Route::NotFound);
        let id = Uuid::new_v4();
        assert_eq!(Route::parse(&format!("/notes/{id}/extra")), Route::NotFound);
    }

    #[test]
    fn display_round_trips_editor_route() {
        let route = Route::Editor(Uuid::new_v4());
        assert_eq!(Route::parse(&route.path()), route);
    }
}
