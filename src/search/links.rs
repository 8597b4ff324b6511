//! Wiki-link extraction.
//!
//! Notes reference each other with `[[Target]]` links. Extraction keeps the
//! first few distinct targets per note; resolution to entity ids happens in
//! the search service via a quoted-title keyword lookup.

use regex::Regex;
use std::sync::OnceLock;

/// Per the wiki-link expansion design: at most this many targets per note.
pub const MAX_LINKS_PER_NOTE: usize = 5;

fn wiki_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("wiki-link regex is valid"))
}

/// First `max` distinct `[[link]]` targets in `content`, in order of first
/// appearance. Targets are trimmed; duplicates count once.
pub fn extract_wiki_links(content: &str, max: usize) -> Vec<String> {
    let mut targets = Vec::new();
    for captures in wiki_link_re().captures_iter(content) {
        let target = captures[1].trim();
        if target.is_empty() || targets.iter().any(|t| t == target) {
            continue;
        }
        targets.push(target.to_string());
        if targets.len() >= max {
            break;
        }
    }
    targets
}
