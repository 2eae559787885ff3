//! Board metadata.

use serde::{Deserialize, Serialize};

use crate::store::{Document, Timestamp};

/// Field boards are ordered by.
pub const CREATED_AT_FIELD: &str = "createdAt";

/// A named canvas with its own stroke collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Store-assigned document id.
    pub id: String,
    pub name: Option<String>,
    /// Server timestamp; `None` until the store resolves it.
    pub created_at: Option<Timestamp>,
}

/// Stored form of a board document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
}

impl Board {
    /// Build a board from a snapshot document.
    ///
    /// Malformed metadata still yields a board so the list mirrors the
    /// snapshot; it just has no name or timestamp.
    pub fn from_document(doc: &Document) -> Self {
        let record = doc.decode::<BoardRecord>().unwrap_or_else(|e| {
            log::warn!("Board {} has malformed metadata: {}", doc.id, e);
            BoardRecord::default()
        });
        Self {
            id: doc.id.clone(),
            name: record.name.filter(|name| !name.trim().is_empty()),
            created_at: record.created_at,
        }
    }

    /// Display title, falling back to `fallback` when the board has no name.
    pub fn title_or(&self, fallback: impl FnOnce() -> String) -> String {
        self.name.clone().unwrap_or_else(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_document() {
        let doc = Document::new("b1", json!({ "name": "Sketches", "createdAt": 42 }));
        let board = Board::from_document(&doc);
        assert_eq!(board.id, "b1");
        assert_eq!(board.name.as_deref(), Some("Sketches"));
        assert_eq!(board.created_at, Some(Timestamp(42)));
    }

    #[test]
    fn test_unnamed_board_title() {
        let doc = Document::new("b2", json!({ "name": "" }));
        let board = Board::from_document(&doc);
        assert_eq!(board.name, None);
        assert_eq!(board.title_or(|| "Board 3".to_string()), "Board 3");
    }

    #[test]
    fn test_malformed_metadata() {
        let doc = Document::new("b3", json!({ "name": 7 }));
        let board = Board::from_document(&doc);
        assert_eq!(board.id, "b3");
        assert_eq!(board.name, None);
        assert_eq!(board.created_at, None);
    }
}
