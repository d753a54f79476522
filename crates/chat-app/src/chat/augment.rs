use ollachat_search::SearchResult;

/// Number of search results folded into the prompt context.
pub const MAX_CONTEXT_RESULTS: usize = 3;

/// Joins the leading results as `title: snippet` blocks separated by blank lines.
pub fn build_search_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .take(MAX_CONTEXT_RESULTS)
        .map(|result| format!("{}: {}", result.title, result.snippet))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn augmented_prompt(question: &str, context: &str) -> String {
    format!(
        "Based on the following search results, answer the question: {question}\n\nSearch results:\n{context}"
    )
}
