#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use brain::config::BrainConfig;
use brain::db;
use brain::embedding::{EmbedError, EmbeddingBackend, TaskType};
use brain::notes::{KeywordHit, NoteStore, NoteStoreError};
use rusqlite::Connection;

/// Embedding dimension used throughout the integration tests.
pub const DIM: usize = 8;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::load_sqlite_vec();
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn, DIM).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

/// Shared-handle variant for pipeline and search tests.
pub fn shared_test_db() -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(test_db()))
}

/// A config tuned for tests: tiny chunks, DIM-dimensional vectors.
pub fn test_config() -> BrainConfig {
    let mut config = BrainConfig::default();
    config.embedding.dimensions = DIM;
    config.embedding.chunk_target_size = 100;
    config.embedding.chunk_overlap = 20;
    config.embedding.concurrency = 4;
    config.search.content_cache_capacity = 4;
    config
}

/// Deterministic DIM-dim embedding with a spike at position `seed`.
/// Distinct seeds produce orthogonal vectors.
pub fn test_embedding(seed: u8) -> Vec<f32> {
    let mut v = vec![0.0f32; DIM];
    v[seed as usize % DIM] = 1.0;
    v
}

/// An embedding close to `base` (high cosine similarity).
pub fn similar_embedding(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    for (i, x) in v.iter_mut().enumerate() {
        *x += 0.05 * ((i % 3) as f32);
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Write a note file under `root`, creating parent directories.
pub fn write_note(root: &Path, rel_path: &str, content: &str) {
    let path = root.join(rel_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Deterministic in-process embedding backend.
///
/// Texts with an explicit override embed to that vector; everything else
/// gets a vector derived from a hash of the text. Supports failure
/// injection and tracks the peak number of concurrent batch calls.
pub struct MockBackend {
    overrides: Mutex<HashMap<String, Vec<f32>>>,
    fail_all: std::sync::atomic::AtomicBool,
    fail_texts: Mutex<Vec<String>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            overrides: Mutex::new(HashMap::new()),
            fail_all: std::sync::atomic::AtomicBool::new(false),
            fail_texts: Mutex::new(Vec::new()),
            delay: None,
            calls: AtomicUsize::new(0),
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Hold each batch call open briefly so concurrent calls overlap.
    pub fn with_delay(ms: u64) -> Self {
        Self {
            delay: Some(Duration::from_millis(ms)),
            ..Self::new()
        }
    }

    /// Embed `text` (and any chunk starting with it) to `vector`.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        self.overrides
            .lock()
            .unwrap()
            .insert(text.to_string(), vector);
    }

    /// Fail every batch call with an HTTP 500.
    pub fn fail_all(&self) {
        self.fail_all.store(true, Ordering::SeqCst);
    }

    /// Fail batches containing a text that starts with `prefix`.
    pub fn fail_text(&self, prefix: &str) {
        self.fail_texts.lock().unwrap().push(prefix.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of batch calls in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let overrides = self.overrides.lock().unwrap();
        for (key, vector) in overrides.iter() {
            if text.starts_with(key.as_str()) {
                return vector.clone();
            }
        }
        // Stable fallback: spike position from a cheap hash of the text.
        let hash: usize = text.bytes().fold(7usize, |acc, b| {
            acc.wrapping_mul(31).wrapping_add(b as usize)
        });
        test_embedding((hash % DIM) as u8)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockBackend {
    async fn batch_embed(
        &self,
        texts: &[String],
        _task: TaskType,
        _model: Option<&str>,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.fail_all.load(Ordering::SeqCst) {
            Err(EmbedError::Backend { status: 500 })
        } else {
            let fail_texts = self.fail_texts.lock().unwrap().clone();
            if texts
                .iter()
                .any(|t| fail_texts.iter().any(|p| t.starts_with(p.as_str())))
            {
                Err(EmbedError::Backend { status: 500 })
            } else {
                Ok(texts.iter().map(|t| self.vector_for(t)).collect())
            }
        };

        self.current.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn health(&self) -> bool {
        true
    }

    async fn has_model(&self, _name: &str) -> Result<bool, EmbedError> {
        Ok(true)
    }
}

/// Wraps a note store and counts `read_note` calls.
pub struct CountingNoteStore<S> {
    inner: S,
    reads: AtomicUsize,
}

impl<S> CountingNoteStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl<S: NoteStore> NoteStore for CountingNoteStore<S> {
    fn list_notes(&self, project: Option<&str>) -> Result<Vec<String>, NoteStoreError> {
        self.inner.list_notes(project)
    }

    fn read_note(&self, entity_id: &str, project: Option<&str>) -> Result<String, NoteStoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read_note(entity_id, project)
    }

    fn keyword_search(
        &self,
        query: &str,
        page_size: usize,
        project: Option<&str>,
    ) -> Result<Vec<KeywordHit>, NoteStoreError> {
        self.inner.keyword_search(query, page_size, project)
    }
}
