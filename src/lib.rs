//! # papermap
//!
//! Extract authors and affiliations from academic PDFs, geocode the
//! affiliations and keep the result as a browsable, mappable catalogue.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Validate  size limit, MIME type, %PDF magic
//!  ├─ 2. Parse     page text via pdfium (spawn_blocking), pages in order
//!  ├─ 3. Extract   authors + affiliations: language model or local heuristics
//!  ├─ 4. Geocode   one affiliation at a time: GeoCache → Nominatim / Google Maps
//!  └─ 5. Assemble  Paper { id, title, authors, affiliations, uploaded_at }
//! ```
//!
//! Steps 1–3 are all-or-nothing. Step 4 never fails the upload: an
//! affiliation that cannot be located stays unlocated and the reason is
//! reported in [`UploadOutcome::geocoding`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use papermap::{PaperMapConfig, PaperRepository, SqliteStorage, UploadPipeline};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY, PAPERMAP_GEOCODER, ... from the environment
//!     let config = PaperMapConfig::from_env()?;
//!     let storage = Arc::new(SqliteStorage::open(&config.database_path)?);
//!
//!     let pipeline = UploadPipeline::from_config(&config, storage.clone())?;
//!     let outcome = pipeline.upload_file("paper.pdf").await?;
//!
//!     PaperRepository::new(storage).save(&outcome.paper).await?;
//!     eprintln!(
//!         "{}: {}/{} affiliations located",
//!         outcome.paper.title,
//!         outcome.stats.located(),
//!         outcome.stats.affiliations
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `papermap` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bundled` | off     | Embeds the pdfium library in the binary at build time |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! papermap = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extraction;
pub mod geocoding;
pub mod markers;
pub mod model;
pub mod progress;
pub mod prompts;
pub mod storage;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractorKind, GeocoderKind, PaperMapConfig, PaperMapConfigBuilder};
pub use error::{GeocodeError, PaperMapError, StorageError};
pub use extraction::{
    DocumentParser, EntityExtractor, ExtractedEntities, HeuristicExtractor, LlmEntityExtractor,
    ParsedDocument, PdfiumParser,
};
pub use geocoding::{FailurePolicy, GeoCache, Geocoder, GoogleMapsGeocoder, NominatimGeocoder};
pub use markers::{markers_for, MapMarker};
pub use model::{Affiliation, AffiliationCandidate, Author, GeoPoint, Paper};
pub use progress::{NoopProgressCallback, ProgressCallback, UploadProgressCallback};
pub use storage::{MemoryStorage, PaperRepository, SqliteStorage, StorageProvider};
pub use upload::{
    GeocodeReport, GeocodeSource, UploadLimits, UploadOutcome, UploadPipeline, UploadRequest,
    UploadStage, UploadStats,
};
