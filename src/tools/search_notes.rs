//! MCP `search_notes` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `search_notes` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchNotesParams {
    /// Natural language or keyword query.
    #[schemars(description = "Natural language or keyword query to search notes.")]
    pub query: String,

    /// Search mode: `"auto"`, `"semantic"`, `"keyword"`, or `"hybrid"`. Defaults to auto.
    #[schemars(
        description = "Search mode: 'auto' (semantic with keyword fallback), 'semantic', 'keyword', or 'hybrid'. Defaults to 'auto'."
    )]
    pub mode: Option<String>,

    /// Maximum number of results to return. Defaults to 10.
    #[schemars(description = "Maximum number of results to return. Defaults to 10.")]
    pub limit: Option<usize>,

    /// Minimum similarity (0.0-1.0) for semantic results. Defaults to 0.7.
    #[schemars(
        description = "Minimum similarity threshold (0.0-1.0) for semantic results. Defaults to 0.7."
    )]
    pub threshold: Option<f64>,

    /// Follow wiki-links this many hops from the base results. Defaults to 0.
    #[schemars(
        description = "Follow [[wiki-links]] this many hops from the base results, adding related notes. Defaults to 0 (no expansion)."
    )]
    pub depth: Option<usize>,

    /// Restrict results to notes under these folder prefixes.
    #[schemars(
        description = "Restrict results to notes whose path starts with any of these folder prefixes (e.g. 'docs/')."
    )]
    pub folders: Option<Vec<String>>,

    /// Include the (truncated) full note body on each result.
    #[schemars(
        description = "If true, attach the full note content (truncated to the configured character limit) to each result."
    )]
    pub full_content: Option<bool>,

    /// Project (subdirectory) to scope the search to.
    #[schemars(description = "Project (notes subdirectory) to scope the search to.")]
    pub project: Option<String>,
}
