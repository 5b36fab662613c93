//! Prompts for language-model entity extraction.
//!
//! Kept apart from [`crate::extraction`] so the wording can change without
//! touching response parsing, and so tests can inspect the prompt directly.

/// System prompt for author and affiliation extraction.
///
/// The response format here is what [`crate::extraction::parse_entities`]
/// expects; change both together.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You extract bibliographic metadata from the text of academic papers.

From the paper text supplied by the user, extract the authors and their affiliations.

Follow these rules precisely:

1. AUTHORS
   - List every author of the paper, in the order given
   - Write each name as "Given Family" or "Family, Given", as printed
   - Do not include titles, degrees or footnote markers

2. AFFILIATIONS
   - List the organisations the authors belong to: universities, institutes,
     laboratories, companies
   - Include the country of each organisation when it can be determined

3. OUTPUT FORMAT
   - Respond with ONLY this JSON document and nothing else:
     {
       "authors": ["Author Name 1", "Author Name 2"],
       "affiliations": [
         {"name": "Organisation 1", "country": "Country 1"},
         {"name": "Organisation 2", "country": "Country 2"}
       ]
     }
   - Use null for an unknown country
   - Do NOT add commentary or explanations"#;

/// Build the user message carrying the (already truncated) paper text.
pub fn extraction_user_message(paper_text: &str) -> String {
    format!("Paper text:\n\n\"\"\"{}\"\"\"", paper_text)
}
