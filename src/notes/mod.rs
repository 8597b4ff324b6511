//! Note store port.
//!
//! The retrieval core never owns notes; it sees them through this narrow
//! interface: list ids, read one body, keyword-search. The default
//! implementation reads a markdown directory ([`fs_store::FsNoteStore`]), but
//! tests and embedders can substitute anything.

pub mod fs_store;

pub use fs_store::FsNoteStore;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NoteStoreError {
    #[error("note not found: {0}")]
    NotFound(String),

    #[error("failed to read note {entity_id}: {source}")]
    Io {
        entity_id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to scan notes: {0}")]
    Scan(String),
}

/// A keyword-search hit from the note store.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub entity_id: String,
    pub title: String,
    pub snippet: String,
    /// Relevance score in [0, 1]; 0 when the store provides none.
    pub score: f64,
}

/// Narrow port over the external note store. All operations are fallible
/// and may block on I/O; async callers run them on blocking tasks.
pub trait NoteStore: Send + Sync {
    /// All entity ids, optionally restricted to a project.
    fn list_notes(&self, project: Option<&str>) -> Result<Vec<String>, NoteStoreError>;

    /// Full markdown body of one note.
    fn read_note(&self, entity_id: &str, project: Option<&str>)
        -> Result<String, NoteStoreError>;

    /// Full-text keyword search, at most `page_size` hits, best first.
    fn keyword_search(
        &self,
        query: &str,
        page_size: usize,
        project: Option<&str>,
    ) -> Result<Vec<KeywordHit>, NoteStoreError>;
}

/// Derive a human-readable title from an entity id: last path segment,
/// dashes to spaces, words title-cased. `"docs/auth-design"` → `"Auth Design"`.
pub fn title_from_entity_id(entity_id: &str) -> String {
    let slug = entity_id.rsplit('/').next().unwrap_or(entity_id);
    slug.split('-')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
