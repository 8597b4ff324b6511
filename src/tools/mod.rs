pub mod generate_embeddings;
pub mod index_status;
pub mod search_notes;

use std::sync::{Arc, Mutex};

use generate_embeddings::GenerateEmbeddingsParams;
use index_status::IndexStatusParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use rusqlite::Connection;
use search_notes::SearchNotesParams;

use crate::config::BrainConfig;
use crate::db::migrations;
use crate::embedding::EmbeddingBackend;
use crate::index::pipeline::{EmbedProjectOptions, EmbeddingPipeline};
use crate::index::store;
use crate::search::{SearchMode, SearchOptions, SearchService};

/// The Brain MCP tool handler. Holds shared state (db connection, embedding
/// backend, pipeline, search service) and exposes all MCP tools via the
/// `#[tool_router]` macro.
#[derive(Clone)]
pub struct BrainTools {
    tool_router: ToolRouter<Self>,
    db: Arc<Mutex<Connection>>,
    backend: Arc<dyn EmbeddingBackend>,
    pipeline: EmbeddingPipeline,
    search: Arc<SearchService>,
    config: Arc<BrainConfig>,
}

#[tool_router]
impl BrainTools {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        backend: Arc<dyn EmbeddingBackend>,
        pipeline: EmbeddingPipeline,
        search: Arc<SearchService>,
        config: Arc<BrainConfig>,
    ) -> Self {
        Self {
            tool_router: Self::tool_router(),
            db,
            backend,
            pipeline,
            search,
            config,
        }
    }

    /// Search notes semantically, by keyword, or both.
    #[tool(
        description = "Search notes by natural language query. Modes: auto (semantic with keyword fallback), semantic, keyword, hybrid. Supports folder filters, wiki-link expansion (depth) and full-content results."
    )]
    async fn search_notes(
        &self,
        Parameters(params): Parameters<SearchNotesParams>,
    ) -> Result<String, String> {
        if params.query.trim().is_empty() {
            return Err("query must not be empty".into());
        }
        let mode = match &params.mode {
            Some(m) => m.parse::<SearchMode>().map_err(|e| e.to_string())?,
            None => SearchMode::Auto,
        };
        let threshold = params.threshold.unwrap_or(self.config.search.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err("threshold must be between 0.0 and 1.0".into());
        }

        let options = SearchOptions {
            limit: params.limit.unwrap_or(self.config.search.default_limit),
            threshold,
            mode,
            depth: params.depth.unwrap_or(0),
            folders: params.folders.unwrap_or_default(),
            full_content: params.full_content.unwrap_or(false),
            project: params.project,
        };

        tracing::info!(
            query = %params.query,
            mode = %options.mode,
            limit = options.limit,
            depth = options.depth,
            "search_notes called"
        );

        let response = self
            .search
            .search(&params.query, options)
            .await
            .map_err(|e| format!("search failed: {e}"))?;

        serde_json::to_string(&response).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Chunk and embed notes into the vector index.
    #[tool(
        description = "Generate embeddings for notes missing from the vector index. Set force=true to re-embed everything; limit caps the number of notes processed."
    )]
    async fn generate_embeddings(
        &self,
        Parameters(params): Parameters<GenerateEmbeddingsParams>,
    ) -> Result<String, String> {
        let options = EmbedProjectOptions {
            force: params.force.unwrap_or(false),
            limit: params.limit.unwrap_or(0),
        };
        tracing::info!(
            force = options.force,
            limit = options.limit,
            "generate_embeddings called"
        );

        let report = self.pipeline.embed_project(options).await;
        serde_json::to_string(&report).map_err(|e| format!("serialization failed: {e}"))
    }

    /// Report index coverage and backend health.
    #[tool(
        description = "Report the state of the vector index: embedded note and chunk counts, embedding model and dimensions, and whether the embedding backend is reachable."
    )]
    async fn index_status(
        &self,
        Parameters(_params): Parameters<IndexStatusParams>,
    ) -> Result<String, String> {
        let db = Arc::clone(&self.db);
        let (notes, chunks, model, dimensions) = tokio::task::spawn_blocking(move || {
            let conn = db
                .lock()
                .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
            let notes = store::count_entities(&conn)?;
            let chunks = store::count_rows(&conn)?;
            let model = migrations::get_embedding_model(&conn)?;
            let dimensions = migrations::get_embedding_dimensions(&conn)?;
            Ok::<_, anyhow::Error>((notes, chunks, model, dimensions))
        })
        .await
        .map_err(|e| format!("db task failed: {e}"))?
        .map_err(|e| format!("status query failed: {e}"))?;

        let backend_healthy = self.backend.health().await;

        serde_json::to_string(&serde_json::json!({
            "embedded_notes": notes,
            "chunks": chunks,
            "embedding_model": model.unwrap_or_else(|| self.config.embedding.model.clone()),
            "dimensions": dimensions.unwrap_or(self.config.embedding.dimensions),
            "backend_healthy": backend_healthy,
        }))
        .map_err(|e| format!("serialization failed: {e}"))
    }
}

#[tool_handler]
impl ServerHandler for BrainTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Brain exposes a personal knowledge graph. Use search_notes to find notes, \
                 generate_embeddings to build the vector index, and index_status to check \
                 index coverage."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
