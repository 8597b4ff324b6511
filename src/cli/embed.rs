//! `brain embed` — chunk and embed the notes corpus.

use anyhow::Result;

use crate::index::pipeline::EmbedProjectOptions;
use crate::server::SharedState;

pub async fn run(state: &SharedState, options: EmbedProjectOptions) -> Result<()> {
    if !state.backend.health().await {
        anyhow::bail!(
            "embedding backend unreachable at {} — is it running?",
            state.config.embedding.base_url
        );
    }
    match state.backend.has_model(&state.config.embedding.model).await {
        Ok(false) => {
            anyhow::bail!(
                "model '{}' not available on the backend — pull it first",
                state.config.embedding.model
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "could not verify model availability, continuing");
        }
        Ok(true) => {}
    }

    let report = state.pipeline.embed_project(options).await;

    println!(
        "Embedded {} note(s) ({} chunks), {} failed.",
        report.processed, report.total_chunks, report.failed
    );
    for error in &report.errors {
        eprintln!("  error: {error}");
    }
    if report.failed > 0 {
        anyhow::bail!("{} note(s) failed to embed", report.failed);
    }
    Ok(())
}
