//! The unified search service.
//!
//! Dispatches a query to the semantic, keyword, or hybrid branch, then
//! post-processes: folder filter, depth-N wiki-link expansion, optional
//! full-content enrichment through the bounded cache.
//!
//! Failure model: semantic errors are recovered (auto falls back to keyword,
//! explicit semantic mode returns empty); keyword errors propagate;
//! enrichment errors are swallowed per result.
//!
//! Note-store scans walk the corpus on disk, so every note-store call and
//! every DB lock goes through `spawn_blocking`; the async executor only ever
//! awaits.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::config::BrainConfig;
use crate::embedding::{EmbeddingBackend, TaskType};
use crate::index::store::{self, similarity_from_distance};
use crate::notes::{title_from_entity_id, KeywordHit, NoteStore};
use crate::search::cache::ContentCache;
use crate::search::links::{extract_wiki_links, MAX_LINKS_PER_NOTE};
use crate::search::{
    truncate_chars, ResultSource, SearchMode, SearchOptions, SearchResponse, SearchResult,
};

/// Max snippet length in characters.
const SNIPPET_CHARS: usize = 200;

/// Candidate multiplier for semantic search: fetch `limit * 3` chunks so
/// per-note deduplication still fills the page.
const CANDIDATE_FACTOR: usize = 3;

pub struct SearchService {
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn EmbeddingBackend>,
    notes: Arc<dyn NoteStore>,
    config: Arc<BrainConfig>,
    cache: Mutex<ContentCache>,
}

impl SearchService {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        backend: Arc<dyn EmbeddingBackend>,
        notes: Arc<dyn NoteStore>,
        config: Arc<BrainConfig>,
    ) -> Self {
        let cache = Mutex::new(ContentCache::new(config.search.content_cache_capacity));
        Self {
            db,
            backend,
            notes,
            config,
            cache,
        }
    }

    /// Unified entry point: mode dispatch plus post-processing.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let limit = if options.limit == 0 {
            self.config.search.default_limit
        } else {
            options.limit
        };
        let threshold = options.threshold;
        let project = options.project.as_deref();

        let (mut results, actual_source) = match options.mode {
            SearchMode::Semantic => {
                match self.semantic_results(query, limit, threshold).await {
                    Ok(results) => (results, ResultSource::Semantic),
                    Err(e) => {
                        warn!(error = %e, "semantic search failed, returning empty");
                        (Vec::new(), ResultSource::Semantic)
                    }
                }
            }
            SearchMode::Keyword => (
                self.keyword_results(query, limit, project).await?,
                ResultSource::Keyword,
            ),
            SearchMode::Hybrid => (
                self.hybrid_results(query, limit, threshold, project).await?,
                ResultSource::Hybrid,
            ),
            SearchMode::Auto => self.auto_results(query, limit, threshold, project).await?,
        };

        if !options.folders.is_empty() {
            apply_folder_filter(&mut results, &options.folders);
        }

        if options.depth > 0 {
            self.expand_related(&mut results, options.depth, project)
                .await;
        }

        if options.full_content {
            self.enrich_full_content(&mut results, project).await;
        }

        Ok(SearchResponse {
            total: results.len(),
            results,
            query: query.to_string(),
            mode: options.mode,
            depth: options.depth,
            actual_source,
        })
    }

    /// Semantic-only convenience wrapper.
    pub async fn semantic_search(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        self.semantic_results(query, limit, threshold).await
    }

    /// Keyword-only convenience wrapper.
    pub async fn keyword_search(
        &self,
        query: &str,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        self.keyword_results(query, limit, project).await
    }

    /// Whether any chunk embeddings exist.
    pub async fn has_embeddings(&self) -> Result<bool> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            store::has_any(&conn)
        })
        .await?
    }

    /// Drop all cached full-content entries. Call on project switch.
    pub fn clear_content_cache(&self) {
        match self.cache.lock() {
            Ok(mut cache) => cache.clear(),
            Err(e) => debug!(error = %e, "content cache lock poisoned"),
        }
    }

    fn cache_get(&self, key: &str) -> Option<String> {
        match self.cache.lock() {
            Ok(mut cache) => cache.get(key),
            Err(e) => {
                debug!(error = %e, "content cache lock poisoned");
                None
            }
        }
    }

    fn cache_insert(&self, key: String, value: String) {
        match self.cache.lock() {
            Ok(mut cache) => cache.insert(key, value),
            Err(e) => debug!(error = %e, "content cache lock poisoned"),
        }
    }

    // ── Branches ──────────────────────────────────────────────────────────

    async fn auto_results(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        project: Option<&str>,
    ) -> Result<(Vec<SearchResult>, ResultSource)> {
        if !self.has_embeddings().await.unwrap_or(false) {
            return Ok((
                self.keyword_results(query, limit, project).await?,
                ResultSource::Keyword,
            ));
        }
        match self.semantic_results(query, limit, threshold).await {
            Ok(results) if !results.is_empty() => Ok((results, ResultSource::Semantic)),
            Ok(_) => Ok((
                self.keyword_results(query, limit, project).await?,
                ResultSource::Keyword,
            )),
            Err(e) => {
                warn!(error = %e, "semantic search failed, falling back to keyword");
                Ok((
                    self.keyword_results(query, limit, project).await?,
                    ResultSource::Keyword,
                ))
            }
        }
    }

    /// Embed the query, fetch nearest chunks, deduplicate per note keeping
    /// the best chunk.
    async fn semantic_results(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
    ) -> Result<Vec<SearchResult>> {
        if !self.has_embeddings().await? {
            return Ok(Vec::new());
        }

        let vectors = self
            .backend
            .batch_embed(&[query.to_string()], TaskType::SearchQuery, None)
            .await?;
        let query_vec = vectors
            .into_iter()
            .next()
            .context("backend returned no query vector")?;

        let k = limit.max(1) * CANDIDATE_FACTOR;
        let max_distance = 1.0 - threshold;
        let db = Arc::clone(&self.db);
        let hits = tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            store::nearest(&conn, &query_vec, k, max_distance)
        })
        .await??;

        // Hits arrive best-first; the first chunk seen per note is its best.
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for hit in hits {
            if !seen.insert(hit.entity_id.clone()) {
                continue;
            }
            results.push(SearchResult {
                title: title_from_entity_id(&hit.entity_id),
                entity_id: hit.entity_id,
                similarity: similarity_from_distance(hit.distance),
                snippet: truncate_chars(&hit.chunk_text, SNIPPET_CHARS),
                source: ResultSource::Semantic,
                depth: 0,
                full_content: None,
            });
            if results.len() >= limit {
                break;
            }
        }
        Ok(results)
    }

    /// Full-corpus keyword scan, off the executor.
    async fn keyword_results(
        &self,
        query: &str,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let notes = Arc::clone(&self.notes);
        let query = query.to_string();
        let project = project.map(str::to_string);
        let hits = tokio::task::spawn_blocking(move || {
            notes.keyword_search(&query, limit, project.as_deref())
        })
        .await
        .context("keyword search task failed")?
        .context("keyword search failed")?;
        Ok(hits.into_iter().map(keyword_hit_to_result).collect())
    }

    /// Semantic and keyword in parallel, merged on entity id with semantic
    /// winning ties.
    async fn hybrid_results(
        &self,
        query: &str,
        limit: usize,
        threshold: f64,
        project: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let (semantic, keyword) = tokio::join!(
            self.semantic_results(query, limit, threshold),
            self.keyword_results(query, limit, project)
        );

        let semantic = semantic.unwrap_or_else(|e| {
            warn!(error = %e, "semantic half of hybrid search failed");
            Vec::new()
        });
        let keyword = keyword?;

        Ok(merge_hybrid(semantic, keyword, limit))
    }

    // ── Post-processing ───────────────────────────────────────────────────

    /// BFS over wiki-links, one level per depth step, never revisiting an
    /// entity across the whole expansion. The traversal reads notes off the
    /// executor in one blocking task.
    async fn expand_related(
        &self,
        results: &mut Vec<SearchResult>,
        depth: usize,
        project: Option<&str>,
    ) {
        let seen: HashSet<String> = results.iter().map(|r| r.entity_id.clone()).collect();
        let frontier: Vec<String> = results.iter().map(|r| r.entity_id.clone()).collect();
        let notes = Arc::clone(&self.notes);
        let project = project.map(str::to_string);

        let related = tokio::task::spawn_blocking(move || {
            collect_related(notes.as_ref(), seen, frontier, depth, project.as_deref())
        })
        .await;

        match related {
            Ok(additions) => results.extend(additions),
            Err(e) => warn!(error = %e, "wiki-link expansion task failed"),
        }
    }

    /// Attach truncated note bodies, going through the cache. Read failures
    /// leave the field empty.
    async fn enrich_full_content(&self, results: &mut [SearchResult], project: Option<&str>) {
        let char_limit = self.config.search.full_content_char_limit;

        let mut missing: Vec<String> = Vec::new();
        for result in results.iter_mut() {
            let key = ContentCache::key(project, &result.entity_id);
            if let Some(cached) = self.cache_get(&key) {
                result.full_content = Some(cached);
            } else {
                missing.push(result.entity_id.clone());
            }
        }
        if missing.is_empty() {
            return;
        }

        let notes = Arc::clone(&self.notes);
        let project_owned = project.map(str::to_string);
        let fetched = tokio::task::spawn_blocking(move || {
            let mut bodies = Vec::new();
            for entity_id in missing {
                match notes.read_note(&entity_id, project_owned.as_deref()) {
                    Ok(content) => bodies.push((entity_id, truncate_chars(&content, char_limit))),
                    Err(e) => {
                        debug!(entity_id = %entity_id, error = %e, "full-content read failed");
                    }
                }
            }
            bodies
        })
        .await;

        let fetched = match fetched {
            Ok(bodies) => bodies,
            Err(e) => {
                warn!(error = %e, "full-content task failed");
                return;
            }
        };
        for (entity_id, content) in fetched {
            self.cache_insert(ContentCache::key(project, &entity_id), content.clone());
            if let Some(result) = results.iter_mut().find(|r| r.entity_id == entity_id) {
                result.full_content = Some(content);
            }
        }
    }
}

fn keyword_hit_to_result(hit: KeywordHit) -> SearchResult {
    SearchResult {
        entity_id: hit.entity_id,
        title: hit.title,
        similarity: hit.score,
        snippet: truncate_chars(&hit.snippet, SNIPPET_CHARS),
        source: ResultSource::Keyword,
        depth: 0,
        full_content: None,
    }
}

/// The blocking half of wiki-link expansion: walk links level by level and
/// return the new results to append.
fn collect_related(
    notes: &dyn NoteStore,
    mut seen: HashSet<String>,
    mut frontier: Vec<String>,
    depth: usize,
    project: Option<&str>,
) -> Vec<SearchResult> {
    let mut additions = Vec::new();
    for level in 1..=depth {
        let mut next = Vec::new();
        for entity_id in &frontier {
            let content = match notes.read_note(entity_id, project) {
                Ok(c) => c,
                Err(e) => {
                    debug!(entity_id = %entity_id, error = %e, "skipping unreadable note in expansion");
                    continue;
                }
            };
            for target in extract_wiki_links(&content, MAX_LINKS_PER_NOTE) {
                let quoted = format!("\"{target}\"");
                let hits = match notes.keyword_search(&quoted, 1, project) {
                    Ok(h) => h,
                    Err(e) => {
                        debug!(target = %target, error = %e, "wiki-link resolution failed");
                        continue;
                    }
                };
                let Some(hit) = hits.into_iter().next() else {
                    continue;
                };
                if !seen.insert(hit.entity_id.clone()) {
                    continue;
                }
                next.push(hit.entity_id.clone());
                additions.push(SearchResult {
                    entity_id: hit.entity_id,
                    title: hit.title,
                    similarity: 0.5,
                    snippet: truncate_chars(&hit.snippet, SNIPPET_CHARS),
                    source: ResultSource::Related,
                    depth: level,
                    full_content: None,
                });
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    additions
}

/// Keep results whose entity id falls under any folder prefix. A trailing
/// `/` on the filter is optional.
fn apply_folder_filter(results: &mut Vec<SearchResult>, folders: &[String]) {
    results.retain(|r| {
        folders.iter().any(|f| {
            let base = f.trim_end_matches('/');
            r.entity_id == base || r.entity_id.starts_with(&format!("{base}/"))
        })
    });
}

/// Merge semantic and keyword results on entity id; semantic wins ties.
/// All merged results report `hybrid` as their source.
fn merge_hybrid(
    semantic: Vec<SearchResult>,
    keyword: Vec<SearchResult>,
    limit: usize,
) -> Vec<SearchResult> {
    let mut merged = semantic;
    let present: HashSet<String> = merged.iter().map(|r| r.entity_id.clone()).collect();
    merged.extend(
        keyword
            .into_iter()
            .filter(|r| !present.contains(&r.entity_id)),
    );

    for result in &mut merged {
        result.source = ResultSource::Hybrid;
    }
    merged.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    merged.truncate(limit);
    merged
}
