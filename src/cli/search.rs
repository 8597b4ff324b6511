//! `brain search` — run a query from the command line.

use anyhow::Result;

use crate::search::SearchOptions;
use crate::server::SharedState;

pub async fn run(state: &SharedState, query: &str, options: SearchOptions) -> Result<()> {
    let response = state.search.search(query, options).await?;

    if response.results.is_empty() {
        println!("No results for '{}'.", response.query);
        return Ok(());
    }

    println!(
        "{} result(s) for '{}' ({}):",
        response.total, response.query, response.actual_source
    );
    for result in &response.results {
        let depth_marker = if result.depth > 0 {
            format!(" (related, depth {})", result.depth)
        } else {
            String::new()
        };
        println!(
            "  {:.3}  {} [{}]{}",
            result.similarity, result.title, result.entity_id, depth_marker
        );
        if !result.snippet.is_empty() {
            println!("         {}", result.snippet);
        }
        if let Some(content) = &result.full_content {
            println!("---\n{content}\n---");
        }
    }
    Ok(())
}
