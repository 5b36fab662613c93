//! Text and entity extraction.
//!
//! Two stages sit behind two traits:
//!
//! * [`DocumentParser`] turns PDF bytes into linear text
//!   ([`PdfiumParser`]).
//! * [`EntityExtractor`] turns that text into authors and unlocated
//!   affiliation candidates ([`LlmEntityExtractor`] or
//!   [`HeuristicExtractor`]).
//!
//! Every affiliation leaving this module is an
//! [`AffiliationCandidate`]; coordinates are attached later by the upload
//! pipeline.

mod heuristic;
mod llm;
mod pdf;

pub use heuristic::{extract_affiliations, extract_authors, HeuristicExtractor};
pub use llm::{locate_json, parse_entities, resolve_provider, truncate_chars, LlmEntityExtractor};
pub use pdf::{join_pages, PdfiumParser, PAGE_SEPARATOR};

use crate::config::{ExtractorKind, PaperMapConfig};
use crate::error::PaperMapError;
use crate::model::{AffiliationCandidate, Author};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Result of parsing a PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDocument {
    /// Page texts in page order, joined with [`PAGE_SEPARATOR`].
    pub text: String,
    /// Title from the document information dictionary, when present.
    pub title: Option<String>,
    pub page_count: usize,
}

/// Binary document → text.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// `name` is used for error messages only.
    async fn parse(&self, bytes: &[u8], name: &str) -> Result<ParsedDocument, PaperMapError>;
}

/// Authors and affiliation candidates found in a paper's text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedEntities {
    pub authors: Vec<Author>,
    pub affiliations: Vec<AffiliationCandidate>,
}

/// Raw text → [`ExtractedEntities`].
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &str;

    async fn extract(&self, text: &str) -> Result<ExtractedEntities, PaperMapError>;
}

/// Build the extractor selected by `config.extractor`.
///
/// `Auto` degrades to [`HeuristicExtractor`] when no language model
/// provider can be resolved; `Llm` returns the resolution error.
pub fn build_extractor(config: &PaperMapConfig) -> Result<Arc<dyn EntityExtractor>, PaperMapError> {
    match config.extractor {
        ExtractorKind::Heuristic => Ok(Arc::new(HeuristicExtractor)),
        ExtractorKind::Llm => {
            let provider = resolve_provider(config)?;
            Ok(Arc::new(LlmEntityExtractor::from_config(provider, config)))
        }
        ExtractorKind::Auto => match resolve_provider(config) {
            Ok(provider) => Ok(Arc::new(LlmEntityExtractor::from_config(provider, config))),
            Err(e) => {
                warn!("No language model available, using heuristic extraction: {}", e);
                Ok(Arc::new(HeuristicExtractor))
            }
        },
    }
}
