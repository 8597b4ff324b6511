//! `brain status` — index coverage and backend health.

use std::sync::Arc;

use anyhow::Result;

use crate::db::migrations;
use crate::index::store;
use crate::server::SharedState;

pub async fn run(state: &SharedState) -> Result<()> {
    let db = Arc::clone(&state.db);
    let (notes, chunks, model, dimensions, last_embed) = tokio::task::spawn_blocking(move || {
        let conn = db
            .lock()
            .map_err(|e| anyhow::anyhow!("db lock poisoned: {e}"))?;
        let notes = store::count_entities(&conn)?;
        let chunks = store::count_rows(&conn)?;
        let model = migrations::get_embedding_model(&conn)?;
        let dimensions = migrations::get_embedding_dimensions(&conn)?;
        let last_embed = store::latest_embedded_at(&conn)?;
        Ok::<_, anyhow::Error>((notes, chunks, model, dimensions, last_embed))
    })
    .await??;

    let total = state
        .notes
        .list_notes(None)
        .map(|ids| ids.len())
        .unwrap_or(0);
    let healthy = state.backend.health().await;

    println!("Database:   {}", state.config.resolved_db_path().display());
    println!("Notes root: {}", state.config.resolved_notes_root().display());
    println!(
        "Model:      {} ({} dims)",
        model.unwrap_or_else(|| state.config.embedding.model.clone()),
        dimensions.unwrap_or(state.config.embedding.dimensions)
    );
    println!("Backend:    {}", if healthy { "reachable" } else { "unreachable" });
    println!("Embedded:   {notes} of {total} note(s), {chunks} chunk(s)");
    if let Some(ts) = last_embed {
        println!("Last embed: {ts}");
    }
    if notes < total {
        println!("Run `brain embed` to index the remaining notes.");
    }
    Ok(())
}
