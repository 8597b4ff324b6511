//! MCP `generate_embeddings` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `generate_embeddings` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GenerateEmbeddingsParams {
    /// Re-embed notes that already have embeddings.
    #[schemars(
        description = "If true, re-embed notes that already have embeddings. Defaults to false (only missing notes)."
    )]
    pub force: Option<bool>,

    /// Process at most this many notes.
    #[schemars(description = "Process at most this many notes. Unlimited when omitted.")]
    pub limit: Option<usize>,
}
