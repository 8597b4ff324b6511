//! MCP server initialization for stdio and Streamable HTTP transports.
//!
//! Provides [`serve_stdio`] and [`serve_http`] entry points that wire up the
//! database, embedding backend, note store, pipeline and search service into
//! a running server.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use rmcp::ServiceExt;

use crate::config::BrainConfig;
use crate::db;
use crate::embedding::{EmbeddingBackend, OllamaBackend};
use crate::index::pipeline::EmbeddingPipeline;
use crate::notes::{FsNoteStore, NoteStore};
use crate::search::SearchService;
use crate::tools::BrainTools;

/// Everything a transport needs to run the server.
pub struct SharedState {
    pub db: Arc<Mutex<rusqlite::Connection>>,
    pub backend: Arc<dyn EmbeddingBackend>,
    pub notes: Arc<dyn NoteStore>,
    pub pipeline: EmbeddingPipeline,
    pub search: Arc<SearchService>,
    pub config: Arc<BrainConfig>,
}

/// Shared setup: open DB, create embedding backend and note store, check for
/// a model mismatch, build the pipeline and search service.
pub fn setup_shared_state(config: BrainConfig) -> Result<SharedState> {
    let db_path = config.resolved_db_path();
    let conn = db::open_database(&db_path, config.embedding.dimensions)?;
    tracing::info!(db = %db_path.display(), "database ready");

    // Warn when the configured model differs from the one that produced the
    // stored vectors. Mixing models makes distances meaningless.
    match db::migrations::get_embedding_model(&conn) {
        Ok(Some(stored)) if stored != config.embedding.model => {
            tracing::warn!(
                stored = %stored,
                configured = %config.embedding.model,
                "embedding model changed — run `brain embed --force` to rebuild the index"
            );
        }
        Ok(None) => {
            db::migrations::set_embedding_model(&conn, &config.embedding.model)?;
        }
        _ => {}
    }

    let db = Arc::new(Mutex::new(conn));

    let backend: Arc<dyn EmbeddingBackend> = Arc::new(OllamaBackend::new(&config.embedding));
    let notes_root = config.resolved_notes_root();
    let notes: Arc<dyn NoteStore> = Arc::new(FsNoteStore::new(&notes_root));
    tracing::info!(notes = %notes_root.display(), "note store ready");

    let config = Arc::new(config);
    let pipeline = EmbeddingPipeline::new(
        Arc::clone(&db),
        Arc::clone(&backend),
        Arc::clone(&notes),
        Arc::clone(&config),
    );
    let search = Arc::new(SearchService::new(
        Arc::clone(&db),
        Arc::clone(&backend),
        Arc::clone(&notes),
        Arc::clone(&config),
    ));

    Ok(SharedState {
        db,
        backend,
        notes,
        pipeline,
        search,
        config,
    })
}

fn spawn_catch_up(pipeline: &EmbeddingPipeline) {
    let pipeline = pipeline.clone();
    tokio::spawn(async move {
        pipeline.catch_up().await;
    });
}

fn build_tools(state: &SharedState) -> BrainTools {
    BrainTools::new(
        Arc::clone(&state.db),
        Arc::clone(&state.backend),
        state.pipeline.clone(),
        Arc::clone(&state.search),
        Arc::clone(&state.config),
    )
}

/// Start the MCP server over stdio transport.
pub async fn serve_stdio(config: BrainConfig) -> Result<()> {
    tracing::info!("starting Brain MCP server on stdio");

    let state = setup_shared_state(config)?;
    if !state.backend.health().await {
        tracing::warn!(
            url = %state.config.embedding.base_url,
            "embedding backend unreachable — semantic search will fall back to keyword"
        );
    }
    spawn_catch_up(&state.pipeline);

    let tools = build_tools(&state);
    let transport = rmcp::transport::stdio();

    let server = tools.serve(transport).await?;
    tracing::info!("MCP server running — waiting for client");

    server.waiting().await?;
    tracing::info!("MCP server shut down");

    Ok(())
}

/// Start the MCP server over Streamable HTTP transport.
pub async fn serve_http(config: BrainConfig) -> Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    let bind_addr = format!("{host}:{port}");

    tracing::info!(addr = %bind_addr, "starting Brain MCP server on HTTP");

    let state = setup_shared_state(config)?;
    spawn_catch_up(&state.pipeline);

    let service = rmcp::transport::streamable_http_server::StreamableHttpService::new(
        move || Ok(build_tools(&state)),
        rmcp::transport::streamable_http_server::session::local::LocalSessionManager::default()
            .into(),
        Default::default(),
    );

    let router = axum::Router::new().nest_service("/mcp", service);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "MCP server listening at http://{bind_addr}/mcp");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl-c");
            tracing::info!("shutting down HTTP server");
        })
        .await?;

    Ok(())
}
