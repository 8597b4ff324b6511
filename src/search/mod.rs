//! Unified search: auto / semantic / keyword / hybrid modes with folder
//! filters, wiki-link graph expansion, and full-content enrichment.

pub mod cache;
pub mod links;
pub mod service;

use serde::{Deserialize, Serialize};

pub use service::SearchService;

/// Search dispatch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Semantic when embeddings exist and return something, else keyword.
    #[default]
    Auto,
    Semantic,
    Keyword,
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(SearchMode::Auto),
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode: {other}. Expected auto, semantic, keyword, or hybrid"
            )),
        }
    }
}

impl std::fmt::Display for SearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SearchMode::Auto => "auto",
            SearchMode::Semantic => "semantic",
            SearchMode::Keyword => "keyword",
            SearchMode::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Semantic,
    Keyword,
    /// Reached through a wiki-link from another result.
    Related,
    Hybrid,
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResultSource::Semantic => "semantic",
            ResultSource::Keyword => "keyword",
            ResultSource::Related => "related",
            ResultSource::Hybrid => "hybrid",
        };
        f.write_str(s)
    }
}

/// A single search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub entity_id: String,
    pub title: String,
    /// Similarity in [0, 1]; 0.5 for related results.
    pub similarity: f64,
    /// At most 200 chars of the best-matching chunk or snippet.
    pub snippet: String,
    pub source: ResultSource,
    /// Wiki-link distance from a direct match; 0 = direct.
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_content: Option<String>,
}

/// Options for [`SearchService::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f64,
    pub mode: SearchMode,
    /// Wiki-link expansion depth; 0 disables expansion.
    pub depth: usize,
    /// Entity-id prefixes; empty means no filter.
    pub folders: Vec<String>,
    pub full_content: bool,
    pub project: Option<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.7,
            mode: SearchMode::Auto,
            depth: 0,
            folders: Vec::new(),
            full_content: false,
            project: None,
        }
    }
}

/// Response envelope for a search call.
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: usize,
    pub query: String,
    pub mode: SearchMode,
    pub depth: usize,
    /// The branch that actually produced the base results (auto mode may
    /// fall back from semantic to keyword).
    pub actual_source: ResultSource,
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_and_displays() {
        assert_eq!("auto".parse::<SearchMode>().unwrap(), SearchMode::Auto);
        assert_eq!("hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Semantic.to_string(), "semantic");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 200), "short");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        let long = "a".repeat(300);
        assert_eq!(truncate_chars(&long, 200).len(), 200);
    }
}
