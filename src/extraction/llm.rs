//! Language-model entity extraction.
//!
//! One chat call per paper: the system prompt from [`crate::prompts`] plus
//! the leading `max_input_chars` characters of the text. The reply must
//! contain a JSON document, either bare or in a ```json fence. Anything
//! else is an [`PaperMapError::Extraction`]; there is no retry.

use super::{EntityExtractor, ExtractedEntities};
use crate::config::PaperMapConfig;
use crate::error::PaperMapError;
use crate::model::{AffiliationCandidate, Author};
use crate::prompts::{extraction_user_message, EXTRACTION_SYSTEM_PROMPT};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Upper bound on authors kept from one response.
pub const MAX_AUTHORS: usize = 20;
/// Upper bound on affiliations kept from one response.
pub const MAX_AFFILIATIONS: usize = 15;

static FENCED_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("valid regex"));

pub struct LlmEntityExtractor {
    provider: Arc<dyn LLMProvider>,
    temperature: f32,
    max_output_tokens: usize,
    max_input_chars: usize,
}

impl LlmEntityExtractor {
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        temperature: f32,
        max_output_tokens: usize,
        max_input_chars: usize,
    ) -> Self {
        Self {
            provider,
            temperature,
            max_output_tokens,
            max_input_chars,
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &PaperMapConfig) -> Self {
        Self::new(
            provider,
            config.llm_temperature,
            config.llm_max_output_tokens,
            config.llm_max_input_chars,
        )
    }

    fn options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_output_tokens),
            ..Default::default()
        }
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    fn name(&self) -> &str {
        "llm"
    }

    async fn extract(&self, text: &str) -> Result<ExtractedEntities, PaperMapError> {
        let clipped = truncate_chars(text, self.max_input_chars);
        let messages = vec![
            ChatMessage::system(EXTRACTION_SYSTEM_PROMPT),
            ChatMessage::user(extraction_user_message(clipped)),
        ];

        let start = Instant::now();
        let response = self
            .provider
            .chat(&messages, Some(&self.options()))
            .await
            .map_err(|e| PaperMapError::LlmApiError {
                message: e.to_string(),
            })?;

        debug!(
            "Extraction call: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(PaperMapError::Extraction {
                detail: "model returned an empty response".to_string(),
            });
        }

        let json = locate_json(&response.content).ok_or_else(|| PaperMapError::Extraction {
            detail: "no JSON object found in model response".to_string(),
        })?;
        let entities = parse_entities(json)?;

        info!(
            "Extracted {} authors and {} affiliations",
            entities.authors.len(),
            entities.affiliations.len()
        );
        Ok(entities)
    }
}

/// Leading `max_chars` characters of `text`, cut on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Find the JSON document in a model reply.
///
/// A ```json fence wins; otherwise the first balanced top-level `{...}`.
/// An unbalanced reply falls back to the span from the first `{` to the
/// last `}`.
pub fn locate_json(reply: &str) -> Option<&str> {
    if let Some(inner) = FENCED_JSON.captures(reply).and_then(|c| c.get(1)) {
        return Some(inner.as_str());
    }

    let start = reply.find('{')?;
    if let Some(end) = balanced_object_end(&reply[start..]) {
        return Some(&reply[start..start + end]);
    }
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Byte length of the object opening `s`, if its braces balance.
fn balanced_object_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse `{"authors": [...], "affiliations": [{"name", "country"}]}`.
///
/// Missing arrays count as empty. Entries without a usable name are
/// dropped before the caps apply; names and countries are trimmed and a
/// blank country becomes `None`.
pub fn parse_entities(json: &str) -> Result<ExtractedEntities, PaperMapError> {
    let value: Value = serde_json::from_str(json).map_err(|e| PaperMapError::Extraction {
        detail: format!("model response is not valid JSON: {e}"),
    })?;
    let object = value.as_object().ok_or_else(|| PaperMapError::Extraction {
        detail: "model response is not a JSON object".to_string(),
    })?;

    let authors = array(object.get("authors"))
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .take(MAX_AUTHORS)
        .map(Author::new)
        .collect();

    let affiliations = array(object.get("affiliations"))
        .filter_map(|entry| {
            let name = entry.get("name")?.as_str()?.trim();
            if name.is_empty() {
                return None;
            }
            let country = entry
                .get("country")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            Some(AffiliationCandidate::new(name, country))
        })
        .take(MAX_AFFILIATIONS)
        .collect();

    Ok(ExtractedEntities {
        authors,
        affiliations,
    })
}

fn array(value: Option<&Value>) -> impl Iterator<Item = &Value> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter())
        .into_iter()
        .flatten()
}

/// Resolve the language model provider, most specific first:
///
/// 1. `config.llm_provider`, used as-is.
/// 2. `config.llm_provider_name` + `config.llm_model` through
///    [`ProviderFactory::create_llm_provider`]. For `gemini` a missing
///    `GEMINI_API_KEY` is reported before the factory is consulted.
/// 3. `"auto"` or an empty name: [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &PaperMapConfig) -> Result<Arc<dyn LLMProvider>, PaperMapError> {
    if let Some(ref provider) = config.llm_provider {
        return Ok(Arc::clone(provider));
    }

    let name = config.llm_provider_name.trim().to_ascii_lowercase();

    if name == "gemini" && !gemini_key_present(config) {
        return Err(PaperMapError::ProviderNotConfigured {
            provider: name,
            hint: "Set GEMINI_API_KEY, or choose another provider with PAPERMAP_LLM_PROVIDER.".to_string(),
        });
    }

    if !name.is_empty() && name != "auto" {
        return ProviderFactory::create_llm_provider(&name, &config.llm_model).map_err(|e| {
            PaperMapError::ProviderNotConfigured {
                provider: name.clone(),
                hint: format!("{e}"),
            }
        });
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PaperMapError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY or another provider's API key.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// The factory reads the key from the process environment; the config
/// copy is only consulted for presence.
fn gemini_key_present(config: &PaperMapConfig) -> bool {
    let in_env = std::env::var("GEMINI_API_KEY").is_ok_and(|k| !k.trim().is_empty());
    in_env || config.llm_api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_block_is_preferred() {
        let reply = "Here you go:\n```json\n{\"authors\": [\"Jane Doe\"]}\n```\nAnything else? {}";
        assert_eq!(locate_json(reply), Some("{\"authors\": [\"Jane Doe\"]}"));

        let upper = "```JSON\n{\"a\": 1}\n```";
        assert_eq!(locate_json(upper), Some("{\"a\": 1}"));
    }

    #[test]
    fn bare_object_is_found_with_trailing_prose() {
        let reply = r#"Sure. {"authors": ["A }"], "affiliations": [{"name": "MIT"}]} Hope this helps {x}"#;
        assert_eq!(
            locate_json(reply),
            Some(r#"{"authors": ["A }"], "affiliations": [{"name": "MIT"}]}"#)
        );
    }

    #[test]
    fn escaped_quotes_inside_strings() {
        let reply = r#"{"authors": ["O\"Brien {"]} tail"#;
        assert_eq!(locate_json(reply), Some(r#"{"authors": ["O\"Brien {"]}"#));
    }

    #[test]
    fn no_object_at_all() {
        assert_eq!(locate_json("I could not find any authors."), None);
        assert_eq!(locate_json("} {"), None);
    }

    #[test]
    fn parses_authors_and_affiliations() {
        let json = r#"{
            "authors": ["  Jane Doe ", "", "John Smith", 42],
            "affiliations": [
                {"name": " University of Tokyo ", "country": "Japan"},
                {"name": "", "country": "Nowhere"},
                {"name": "MIT", "country": "  "},
                {"name": "ETH Zurich", "country": null},
                {"country": "France"}
            ]
        }"#;
        let entities = parse_entities(json).unwrap();

        let authors: Vec<&str> = entities.authors.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(authors, ["Jane Doe", "John Smith"]);
        assert!(entities.authors.iter().all(|a| a.affiliation.is_none()));

        assert_eq!(
            entities.affiliations,
            vec![
                AffiliationCandidate::new("University of Tokyo", Some("Japan".into())),
                AffiliationCandidate::new("MIT", None),
                AffiliationCandidate::new("ETH Zurich", None),
            ]
        );
    }

    #[test]
    fn caps_apply_after_filtering() {
        let names: Vec<String> = (0..30).map(|i| format!("\"Author {i}\"")).collect();
        let affs: Vec<String> = (0..20).map(|i| format!("{{\"name\": \"Lab {i}\"}}")).collect();
        let json = format!(
            "{{\"authors\": [\"\", {}], \"affiliations\": [{{\"name\": \"\"}}, {}]}}",
            names.join(","),
            affs.join(",")
        );
        let entities = parse_entities(&json).unwrap();
        assert_eq!(entities.authors.len(), MAX_AUTHORS);
        assert_eq!(entities.authors[0].name, "Author 0");
        assert_eq!(entities.affiliations.len(), MAX_AFFILIATIONS);
        assert_eq!(entities.affiliations[0].name, "Lab 0");
    }

    #[test]
    fn missing_arrays_are_empty() {
        let entities = parse_entities("{}").unwrap();
        assert!(entities.authors.is_empty());
        assert!(entities.affiliations.is_empty());
    }

    #[test]
    fn invalid_documents_are_extraction_errors() {
        assert!(matches!(parse_entities("{authors: nope}"), Err(PaperMapError::Extraction { .. })));
        assert!(matches!(parse_entities("[1, 2]"), Err(PaperMapError::Extraction { .. })));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("東京大学の研究", 4), "東京大学");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("abc", 0), "");
    }

    #[test]
    fn gemini_without_key_is_not_configured() {
        let config = PaperMapConfig::builder().llm_provider_name("gemini").build().unwrap();
        if std::env::var("GEMINI_API_KEY").is_err() {
            assert!(matches!(
                resolve_provider(&config),
                Err(PaperMapError::ProviderNotConfigured { .. })
            ));
        }
    }

    async fn extractor_replying(reply: &str) -> LlmEntityExtractor {
        let mock = edgequake_llm::MockProvider::new();
        mock.add_response(reply).await;
        LlmEntityExtractor::new(Arc::new(mock), 0.2, 1000, 100_000)
    }

    #[tokio::test]
    async fn fenced_reply_becomes_entities() {
        let reply = "Here is the data:\n```json\n{\"authors\": [\" Jane Doe \", \"\"], \
                     \"affiliations\": [{\"name\": \"University of Tokyo\", \"country\": \"Japan\"}]}\n```";
        let extractor = extractor_replying(reply).await;

        let entities = extractor.extract("University of Tokyo ... Authors: Jane Doe").await.unwrap();
        assert_eq!(entities.authors, vec![Author::new("Jane Doe")]);
        assert_eq!(
            entities.affiliations,
            vec![AffiliationCandidate::new("University of Tokyo", Some("Japan".into()))]
        );
    }

    #[tokio::test]
    async fn prose_reply_is_an_extraction_error() {
        let extractor = extractor_replying("Sorry, I could not find any authors in this paper.").await;
        let err = extractor.extract("some paper text").await.unwrap_err();
        assert!(matches!(err, PaperMapError::Extraction { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn empty_reply_is_an_extraction_error() {
        let extractor = extractor_replying("  \n ").await;
        let err = extractor.extract("some paper text").await.unwrap_err();
        assert!(
            matches!(err, PaperMapError::Extraction { ref detail } if detail.contains("empty")),
            "got {err:?}"
        );
    }
}
