//! Prompt construction for summaries

use crate::types::RetrievalResult;

/// Build the generation prompt from a query and its retrieved passages
///
/// Statements are newline-joined in result order.
pub fn build_prompt(query: &str, results: &[RetrievalResult]) -> String {
    let excerpts = results
        .iter()
        .map(|result| result.statement.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Use the excerpts of the following documents and answer the query, USE MARKDOWN:\nQuery: {}\nExcerpts:\n{}",
        query, excerpts
    )
}
