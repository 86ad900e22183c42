//! Labeled SQL snippets loaded from a plain text file.
//!
//! A block starts at a marker such as `-- name: daily_volume` and runs until the next
//! marker or end of file. Text before the first marker is ignored.

use crate::errors::{AppError, AppResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Placeholder offered first in the query picker. Looking it up yields an empty body.
pub const NO_SELECTION: &str = "-- Select --";

static MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)--\s*name\s*:\s*(.+)").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedQuery {
    pub label: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedQueryStore {
    entries: Vec<NamedQuery>,
}

struct Marker {
    start: usize,
    end: usize,
    label: String,
}

impl NamedQueryStore {
    /// Reads the definitions file. A missing file is an empty store, not an error.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "named query file not found; using empty store");
                return Ok(Self::default());
            }
            Err(error) => {
                return Err(AppError::Io(format!("failed to read {}: {}", path.display(), error)));
            }
        };

        let store = Self::parse(&text);
        tracing::debug!(path = %path.display(), count = store.len(), "loaded named queries");
        Ok(store)
    }

    pub fn parse(text: &str) -> Self {
        let markers = MARKER
            .captures_iter(text)
            .filter_map(|caps| {
                let whole = caps.get(0)?;
                let label = caps.get(1)?;
                Some(Marker {
                    start: whole.start(),
                    end: whole.end(),
                    label: label.as_str().trim().to_string(),
                })
            })
            .collect::<Vec<_>>();

        let mut store = Self::default();
        for (index, marker) in markers.iter().enumerate() {
            let body_end = markers.get(index + 1).map(|next| next.start).unwrap_or(text.len());
            store.insert(marker.label.clone(), text[marker.end..body_end].trim().to_string());
        }
        store
    }

    /// Later definitions of a label replace the body but keep the first position.
    fn insert(&mut self, label: String, body: String) {
        match self.entries.iter_mut().find(|entry| entry.label == label) {
            Some(existing) => existing.body = body,
            None => self.entries.push(NamedQuery { label, body }),
        }
    }

    pub fn lookup(&self, label: &str) -> &str {
        self.entries
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.body.as_str())
            .unwrap_or("")
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.iter().any(|entry| entry.label == label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.label.as_str())
    }

    /// Picker contents: the placeholder followed by every label in file order.
    pub fn choices(&self) -> Vec<String> {
        std::iter::once(NO_SELECTION.to_string())
            .chain(self.labels().map(ToString::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{NamedQueryStore, NO_SELECTION};
    use std::fs;

    #[test]
    fn splits_two_blocks() {
        let store = NamedQueryStore::parse("-- name: all\nSELECT 1;\n-- name: count\nSELECT 2;");
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup("all"), "SELECT 1;");
        assert_eq!(store.lookup("count"), "SELECT 2;");
    }

    #[test]
    fn marker_is_case_and_space_tolerant() {
        let store = NamedQueryStore::parse("--NAME :  Spaced Label  \n  SELECT *\n  FROM rides\n\n");
        assert_eq!(store.lookup("Spaced Label"), "SELECT *\n  FROM rides");
    }

    #[test]
    fn leading_text_is_discarded() {
        let store = NamedQueryStore::parse("-- header comment\nSELECT 0;\n-- name: first\nSELECT 1;");
        assert_eq!(store.labels().collect::<Vec<_>>(), vec!["first"]);
    }

    #[test]
    fn no_markers_yields_empty_store() {
        let store = NamedQueryStore::parse("SELECT 1;\nSELECT 2;");
        assert!(store.is_empty());
        assert_eq!(store.choices(), vec![NO_SELECTION.to_string()]);
    }

    #[test]
    fn duplicate_label_keeps_last_body_and_first_position() {
        let store = NamedQueryStore::parse("-- name: a\nSELECT 1;\n-- name: b\nSELECT 2;\n-- name: a\nSELECT 3;");
        assert_eq!(store.lookup("a"), "SELECT 3;");
        assert_eq!(store.labels().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn lookup_of_unknown_or_placeholder_is_empty() {
        let store = NamedQueryStore::parse("-- name: a\nSELECT 1;");
        assert_eq!(store.lookup(NO_SELECTION), "");
        assert_eq!(store.lookup("missing"), "");
    }

    #[test]
    fn marker_with_empty_body() {
        let store = NamedQueryStore::parse("-- name: empty\n-- name: next\nSELECT 1;");
        assert!(store.contains("empty"));
        assert_eq!(store.lookup("empty"), "");
        assert_eq!(store.lookup("next"), "SELECT 1;");
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = NamedQueryStore::load(&dir.path().join("absent.sql")).expect("load");
        assert!(store.is_empty());
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queries.sql");
        fs::write(&path, "-- name: rides\r\nSELECT * FROM rides;\r\n").expect("write");
        let store = NamedQueryStore::load(&path).expect("load");
        assert_eq!(store.lookup("rides"), "SELECT * FROM rides;");
    }

    #[test]
    fn choices_start_with_placeholder() {
        let store = NamedQueryStore::parse("-- name: x\nSELECT 1;\n-- name: y\nSELECT 2;");
        assert_eq!(store.choices(), vec![NO_SELECTION, "x", "y"]);
    }
}
