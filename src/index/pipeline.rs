//! The embedding pipeline: per-note ingest, corpus generation with bounded
//! concurrency, coalesced per-edit refresh, and the catch-up sweep.
//!
//! The pipeline is the sole writer to the vector store. Corpus generation
//! uses settle-all semantics: one malformed note must not abort a 700-note
//! ingest, so per-note failures are captured in the report and the rest
//! proceed.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::BrainConfig;
use crate::embedding::{EmbedError, EmbeddingBackend, TaskType};
use crate::index::chunker;
use crate::index::store::{self, ChunkRow};
use crate::notes::{NoteStore, NoteStoreError};

/// Log corpus progress every this many notes.
const PROGRESS_INTERVAL: usize = 100;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("embedding note {entity_id} failed: {cause}")]
    NoteEmbedding {
        entity_id: String,
        #[source]
        cause: EmbedError,
    },

    #[error("note store error for {entity_id}: {cause}")]
    NoteRead {
        entity_id: String,
        #[source]
        cause: NoteStoreError,
    },

    #[error("vector store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("embed task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of a corpus run.
#[derive(Debug, Default, serde::Serialize)]
pub struct EmbedReport {
    pub processed: usize,
    pub failed: usize,
    pub total_chunks: usize,
    pub errors: Vec<String>,
}

/// Options for [`EmbeddingPipeline::embed_project`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbedProjectOptions {
    /// Only process this many notes when positive.
    pub limit: usize,
    /// Re-embed notes that already have rows.
    pub force: bool,
}

/// Per-entity refresh coalescing state. A second trigger while one is in
/// flight supersedes the first — last write wins on content.
enum RefreshState {
    InFlight,
    Superseded(String),
}

/// Chunks notes, embeds them in one batch per note, and atomically replaces
/// their vector rows. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct EmbeddingPipeline {
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn EmbeddingBackend>,
    notes: Arc<dyn NoteStore>,
    config: Arc<BrainConfig>,
    semaphore: Arc<Semaphore>,
    refresh: Arc<Mutex<HashMap<String, RefreshState>>>,
    catch_up_gate: Arc<tokio::sync::Mutex<()>>,
}

impl EmbeddingPipeline {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        backend: Arc<dyn EmbeddingBackend>,
        notes: Arc<dyn NoteStore>,
        config: Arc<BrainConfig>,
    ) -> Self {
        let permits = config.embedding.effective_concurrency();
        Self {
            db,
            backend,
            notes,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
            refresh: Arc::new(Mutex::new(HashMap::new())),
            catch_up_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Chunk `content`, embed all chunks in one batch, and atomically replace
    /// the note's rows. On failure nothing is written.
    ///
    /// Returns the number of chunks written.
    pub async fn embed_note(
        &self,
        entity_id: &str,
        content: &str,
    ) -> Result<usize, PipelineError> {
        let chunks = chunker::chunk(
            content,
            self.config.embedding.chunk_target_size,
            self.config.embedding.chunk_overlap,
        );
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = self
            .backend
            .batch_embed(&texts, TaskType::SearchDocument, None)
            .await
            .map_err(|cause| PipelineError::NoteEmbedding {
                entity_id: entity_id.to_string(),
                cause,
            })?;

        let total = chunks.len();
        let rows: Vec<ChunkRow> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(c, embedding)| ChunkRow {
                chunk_id: ChunkRow::id_for(entity_id, c.index),
                entity_id: entity_id.to_string(),
                chunk_index: c.index,
                total_chunks: total,
                chunk_start: c.start,
                chunk_end: c.end,
                chunk_text: c.text,
                embedding,
            })
            .collect();

        let db = Arc::clone(&self.db);
        let entity = entity_id.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            store::upsert_chunks(&mut conn, &entity, &rows)
        })
        .await??;

        debug!(entity_id, chunks = total, "note embedded");
        Ok(total)
    }

    /// Embed the whole corpus with bounded concurrency.
    ///
    /// Unless `force`, notes that already have rows are skipped. Failures of
    /// one note never halt the others; they are collected into the report.
    pub async fn embed_project(&self, options: EmbedProjectOptions) -> EmbedReport {
        let entity_ids = match self.list_corpus().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "failed to list notes for corpus generation");
                return EmbedReport {
                    errors: vec![format!("failed to list notes: {e}")],
                    failed: 1,
                    ..Default::default()
                };
            }
        };

        let targets = match self.filter_targets(entity_ids, &options).await {
            Ok(t) => t,
            Err(e) => {
                return EmbedReport {
                    errors: vec![format!("failed to inspect index: {e}")],
                    failed: 1,
                    ..Default::default()
                }
            }
        };

        info!(
            notes = targets.len(),
            concurrency = self.config.embedding.effective_concurrency(),
            force = options.force,
            "corpus embedding started"
        );
        self.embed_entities(targets).await
    }

    /// All note ids in the corpus, scanned off the executor.
    async fn list_corpus(&self) -> Result<Vec<String>, anyhow::Error> {
        let notes = Arc::clone(&self.notes);
        let ids = tokio::task::spawn_blocking(move || notes.list_notes(None)).await??;
        Ok(ids)
    }

    /// Entity ids already present in the index, read off the executor.
    async fn indexed_entities(&self) -> Result<HashSet<String>, anyhow::Error> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || -> Result<HashSet<String>, anyhow::Error> {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            Ok(store::distinct_entities(&conn)?.into_iter().collect())
        })
        .await?
    }

    async fn filter_targets(
        &self,
        entity_ids: Vec<String>,
        options: &EmbedProjectOptions,
    ) -> Result<Vec<String>, anyhow::Error> {
        let mut targets = if options.force {
            entity_ids
        } else {
            let embedded = self.indexed_entities().await?;
            entity_ids
                .into_iter()
                .filter(|id| !embedded.contains(id))
                .collect()
        };
        if options.limit > 0 {
            targets.truncate(options.limit);
        }
        Ok(targets)
    }

    /// Settle-all embed of a fixed set of notes, gated by the semaphore.
    async fn embed_entities(&self, entity_ids: Vec<String>) -> EmbedReport {
        let mut tasks = JoinSet::new();
        for entity_id in entity_ids {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&self.semaphore);
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore never closed");
                let result = pipeline.embed_one_listed(&entity_id).await;
                (entity_id, result)
            });
        }

        let mut report = EmbedReport::default();
        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(chunks))) => {
                    report.processed += 1;
                    report.total_chunks += chunks;
                }
                Ok((entity_id, Err(e))) => {
                    warn!(entity_id = %entity_id, error = %e, "note embedding failed");
                    report.failed += 1;
                    report.errors.push(e.to_string());
                }
                Err(e) => {
                    report.failed += 1;
                    report.errors.push(format!("embed task panicked: {e}"));
                }
            }
            done += 1;
            if done % PROGRESS_INTERVAL == 0 {
                info!(
                    done,
                    processed = report.processed,
                    failed = report.failed,
                    "corpus embedding progress"
                );
            }
        }

        info!(
            processed = report.processed,
            failed = report.failed,
            total_chunks = report.total_chunks,
            "corpus embedding finished"
        );
        report
    }

    async fn embed_one_listed(&self, entity_id: &str) -> Result<usize, PipelineError> {
        let notes = Arc::clone(&self.notes);
        let id = entity_id.to_string();
        let content = tokio::task::spawn_blocking(move || notes.read_note(&id, None))
            .await?
            .map_err(|cause| PipelineError::NoteRead {
                entity_id: entity_id.to_string(),
                cause,
            })?;
        self.embed_note(entity_id, &content).await
    }

    /// Fire-and-forget refresh after an edit. Does not block the caller;
    /// errors are logged, not surfaced. Concurrent triggers for the same
    /// entity coalesce to the newest content.
    pub fn trigger_refresh(&self, entity_id: &str, content: String) {
        {
            let mut refresh = match self.refresh.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    warn!(entity_id, error = %e, "refresh map lock poisoned, dropping refresh");
                    return;
                }
            };
            if refresh.contains_key(entity_id) {
                refresh.insert(entity_id.to_string(), RefreshState::Superseded(content));
                debug!(entity_id, "refresh superseded by newer content");
                return;
            }
            refresh.insert(entity_id.to_string(), RefreshState::InFlight);
        }

        let pipeline = self.clone();
        let entity_id = entity_id.to_string();
        tokio::spawn(async move {
            pipeline.run_refresh(entity_id, content).await;
        });
    }

    async fn run_refresh(self, entity_id: String, mut content: String) {
        loop {
            if let Err(e) = self.embed_note(&entity_id, &content).await {
                warn!(entity_id = %entity_id, error = %e, "background refresh failed");
            }

            let next = match self.refresh.lock() {
                Ok(mut refresh) => match refresh.remove(&entity_id) {
                    Some(RefreshState::Superseded(newer)) => {
                        refresh.insert(entity_id.clone(), RefreshState::InFlight);
                        Some(newer)
                    }
                    _ => None,
                },
                Err(e) => {
                    warn!(entity_id = %entity_id, error = %e, "refresh map lock poisoned");
                    None
                }
            };
            match next {
                Some(newer) => content = newer,
                None => break,
            }
        }
    }

    /// Embed every note that has no rows yet. Single-flight: a second call
    /// while one runs returns immediately.
    pub async fn catch_up(&self) -> Option<EmbedReport> {
        let Ok(_gate) = self.catch_up_gate.try_lock() else {
            debug!("catch-up already running, skipping");
            return None;
        };
        info!("catch-up triggered");

        let all = match self.list_corpus().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "catch-up failed to list notes");
                return None;
            }
        };

        let embedded = match self.indexed_entities().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "catch-up failed to read index");
                return None;
            }
        };

        let missing: Vec<String> = all
            .into_iter()
            .filter(|id| !embedded.contains(id))
            .collect();
        if missing.is_empty() {
            debug!("catch-up complete: nothing missing");
            return None;
        }

        info!(missing = missing.len(), "catch-up embedding missing notes");
        let report = self.embed_entities(missing).await;
        if report.failed > 0 {
            warn!(
                processed = report.processed,
                failed = report.failed,
                "catch-up finished with failures"
            );
        } else {
            info!(processed = report.processed, "catch-up complete");
        }
        Some(report)
    }
}
