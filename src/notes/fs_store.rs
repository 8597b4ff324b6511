//! Markdown-directory note store.
//!
//! Entity ids are slash-separated relative paths without the `.md` extension.
//! Hidden files and directories are skipped. Keyword search is a scored
//! substring scan; quoted queries match as a phrase, which makes wiki-link
//! title resolution behave like an exact lookup on well-named corpora.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{title_from_entity_id, KeywordHit, NoteStore, NoteStoreError};

pub struct FsNoteStore {
    root: PathBuf,
}

impl FsNoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The scan root for a request: the project subdirectory when given.
    fn scoped_root(&self, project: Option<&str>) -> PathBuf {
        match project {
            Some(p) => self.root.join(p),
            None => self.root.clone(),
        }
    }

    fn entity_path(&self, entity_id: &str, project: Option<&str>) -> Option<PathBuf> {
        // Entity ids are opaque slugs, never filesystem escapes.
        if entity_id.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
            return None;
        }
        Some(self.scoped_root(project).join(format!("{entity_id}.md")))
    }

    fn scan(&self, project: Option<&str>) -> Result<Vec<(String, PathBuf)>, NoteStoreError> {
        let root = self.scoped_root(project);
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();
        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !is_hidden(e))
        {
            let entry = entry.map_err(|e| NoteStoreError::Scan(e.to_string()))?;
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "md") && path.is_file() {
                if let Some(entity_id) = entity_id_for(&root, path) {
                    notes.push((entity_id, path.to_path_buf()));
                }
            }
        }
        notes.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(notes)
    }
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

fn entity_id_for(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?.with_extension("");
    let mut segments = Vec::new();
    for comp in rel.components() {
        segments.push(comp.as_os_str().to_str()?.to_string());
    }
    Some(segments.join("/"))
}

impl NoteStore for FsNoteStore {
    fn list_notes(&self, project: Option<&str>) -> Result<Vec<String>, NoteStoreError> {
        Ok(self.scan(project)?.into_iter().map(|(id, _)| id).collect())
    }

    fn read_note(
        &self,
        entity_id: &str,
        project: Option<&str>,
    ) -> Result<String, NoteStoreError> {
        let path = self
            .entity_path(entity_id, project)
            .ok_or_else(|| NoteStoreError::NotFound(entity_id.to_string()))?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(NoteStoreError::NotFound(entity_id.to_string()))
            }
            Err(e) => Err(NoteStoreError::Io {
                entity_id: entity_id.to_string(),
                source: e,
            }),
        }
    }

    fn keyword_search(
        &self,
        query: &str,
        page_size: usize,
        project: Option<&str>,
    ) -> Result<Vec<KeywordHit>, NoteStoreError> {
        let trimmed = query.trim();
        if trimmed.is_empty() || page_size == 0 {
            return Ok(Vec::new());
        }

        // A quoted query matches as one phrase; otherwise each word is a term.
        let phrase = trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .filter(|s| !s.is_empty());
        let terms: Vec<String> = match phrase {
            Some(p) => vec![p.to_lowercase()],
            None => trimmed.split_whitespace().map(|t| t.to_lowercase()).collect(),
        };

        let mut hits: Vec<KeywordHit> = Vec::new();
        for (entity_id, path) in self.scan(project)? {
            let content = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(entity_id = %entity_id, error = %e, "skipping unreadable note");
                    continue;
                }
            };
            let title = title_from_entity_id(&entity_id);
            if let Some(hit) = score_note(&entity_id, &title, &content, &terms) {
                hits.push(hit);
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        hits.truncate(page_size);
        Ok(hits)
    }
}

/// Score one note against the query terms. Title matches weigh much more
/// than body occurrences; the score is squashed into [0, 1].
fn score_note(
    entity_id: &str,
    title: &str,
    content: &str,
    terms: &[String],
) -> Option<KeywordHit> {
    let content_lower = content.to_lowercase();
    let title_lower = title.to_lowercase();
    let slug_lower = entity_id.to_lowercase();

    let mut raw = 0.0f64;
    let mut first_match: Option<usize> = None;
    for term in terms {
        let occurrences = content_lower.matches(term.as_str()).count();
        raw += occurrences as f64;
        if title_lower.contains(term.as_str()) || slug_lower.contains(term.as_str()) {
            raw += 10.0;
        }
        if first_match.is_none() {
            first_match = content_lower.find(term.as_str());
        }
    }
    if raw == 0.0 {
        return None;
    }

    let snippet_start = first_match.unwrap_or(0);
    let snippet = snippet_line(content, snippet_start);

    Some(KeywordHit {
        entity_id: entity_id.to_string(),
        title: title.to_string(),
        snippet,
        score: raw / (raw + 10.0),
    })
}

/// The line containing the first match, truncated to 200 chars.
fn snippet_line(content: &str, around: usize) -> String {
    let around = around.min(content.len());
    let start = content[..around].rfind('\n').map(|p| p + 1).unwrap_or(0);
    let end = content[around..]
        .find('\n')
        .map(|p| around + p)
        .unwrap_or(content.len());
    let line = content[start..end].trim();
    line.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> (tempfile::TempDir, FsNoteStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("docs")).unwrap();
        std::fs::write(
            dir.path().join("docs/auth-design.md"),
            "# Auth Design\n\nToken rotation and refresh flows.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("docs/token-flow.md"),
            "# Token Flow\n\nSee [[Auth-Design]] for the rotation schedule.\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("scratch.md"), "Unrelated scribbles.\n").unwrap();
        std::fs::write(dir.path().join(".hidden.md"), "should not appear\n").unwrap();
        let store = FsNoteStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn lists_notes_with_folder_qualified_ids() {
        let (_dir, store) = fixture();
        let ids = store.list_notes(None).unwrap();
        assert_eq!(ids, vec!["docs/auth-design", "docs/token-flow", "scratch"]);
    }

    #[test]
    fn hidden_files_are_skipped() {
        let (_dir, store) = fixture();
        let ids = store.list_notes(None).unwrap();
        assert!(!ids.iter().any(|id| id.contains("hidden")));
    }

    #[test]
    fn read_note_returns_content() {
        let (_dir, store) = fixture();
        let content = store.read_note("docs/auth-design", None).unwrap();
        assert!(content.contains("Token rotation"));
    }

    #[test]
    fn read_missing_note_is_not_found() {
        let (_dir, store) = fixture();
        let err = store.read_note("docs/nope", None).unwrap_err();
        assert!(matches!(err, NoteStoreError::NotFound(_)));
    }

    #[test]
    fn read_rejects_path_escapes() {
        let (_dir, store) = fixture();
        let err = store.read_note("../etc/passwd", None).unwrap_err();
        assert!(matches!(err, NoteStoreError::NotFound(_)));
    }

    #[test]
    fn keyword_search_ranks_title_matches_first() {
        let (_dir, store) = fixture();
        let hits = store.keyword_search("token", 10, None).unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].entity_id, "docs/token-flow");
        assert!(hits[0].score > 0.0 && hits[0].score <= 1.0);
    }

    #[test]
    fn quoted_query_matches_as_phrase() {
        let (_dir, store) = fixture();
        let hits = store.keyword_search("\"Auth-Design\"", 1, None).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity_id, "docs/auth-design");
    }

    #[test]
    fn project_scopes_the_scan() {
        let (_dir, store) = fixture();
        let ids = store.list_notes(Some("docs")).unwrap();
        assert_eq!(ids, vec!["auth-design", "token-flow"]);
    }

    #[test]
    fn empty_query_returns_nothing() {
        let (_dir, store) = fixture();
        assert!(store.keyword_search("   ", 10, None).unwrap().is_empty());
    }
}
