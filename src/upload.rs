//! Upload orchestration: PDF bytes → geocoded [`Paper`].
//!
//! Stages run strictly in order, each awaited before the next starts:
//!
//! ```text
//! Parsing → Extracting → Geocoding → Assembling → Done
//!    └──────────┴────────────┴───────────┴──────→ Failed
//! ```
//!
//! Validation, parsing and extraction failures abort the upload and no paper
//! is produced. Geocoding is per affiliation and never aborts: a miss or a
//! provider error leaves that affiliation unlocated and is recorded in the
//! [`UploadOutcome`]. Persisting the paper is left to the caller, so nothing
//! is written for a failed upload.

use crate::config::{PaperMapConfig, PDF_MIME_TYPE};
use crate::error::{GeocodeError, PaperMapError};
use crate::extraction::{build_extractor, DocumentParser, EntityExtractor, PdfiumParser};
use crate::geocoding::{build_geocoder, FailurePolicy, GeoCache, Geocoder};
use crate::model::{Affiliation, AffiliationCandidate, GeoPoint, Paper};
use crate::progress::{NoopProgressCallback, ProgressCallback};
use crate::storage::StorageProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Pipeline state, reported through [`crate::UploadProgressCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadStage {
    Parsing,
    Extracting,
    Geocoding,
    Assembling,
    Done,
    Failed,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UploadStage::Parsing => "parsing",
            UploadStage::Extracting => "extracting",
            UploadStage::Geocoding => "geocoding",
            UploadStage::Assembling => "assembling",
            UploadStage::Done => "done",
            UploadStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One uploaded file.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    /// Used for the title fallback and in error messages.
    pub file_name: String,
    /// Declared content type, if the transport supplied one.
    pub mime_type: Option<String>,
}

impl UploadRequest {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>) -> Self {
        Self {
            bytes,
            file_name: file_name.into(),
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }
}

/// Checks applied before a file is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_bytes: usize,
    pub accepted_mime_type: String,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024,
            accepted_mime_type: PDF_MIME_TYPE.to_string(),
        }
    }
}

impl UploadLimits {
    pub fn from_config(config: &PaperMapConfig) -> Self {
        Self {
            max_bytes: config.max_upload_bytes,
            accepted_mime_type: config.accepted_mime_type.clone(),
        }
    }

    fn check(&self, request: &UploadRequest) -> Result<(), PaperMapError> {
        let size = request.bytes.len();
        if size > self.max_bytes {
            return Err(PaperMapError::FileTooLarge {
                name: request.file_name.clone(),
                size,
                limit: self.max_bytes,
            });
        }

        if let Some(ref declared) = request.mime_type {
            let essence = declared.split(';').next().unwrap_or_default().trim();
            if !essence.eq_ignore_ascii_case(&self.accepted_mime_type) {
                return Err(PaperMapError::UnsupportedFileType {
                    name: request.file_name.clone(),
                    mime: declared.clone(),
                    accepted: self.accepted_mime_type.clone(),
                });
            }
        }

        if !request.bytes.starts_with(PDF_MAGIC) {
            return Err(PaperMapError::NotAPdf {
                name: request.file_name.clone(),
                magic: request.bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
            });
        }
        Ok(())
    }
}

/// Where an affiliation's coordinates came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "error")]
pub enum GeocodeSource {
    Cache,
    Provider,
    NotFound,
    Failed(GeocodeError),
}

/// Geocoding result for one affiliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeReport {
    pub affiliation: String,
    pub source: GeocodeSource,
    pub geo_point: Option<GeoPoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadStats {
    pub page_count: usize,
    pub authors: usize,
    pub affiliations: usize,
    /// Affiliations answered by [`GeoCache`].
    pub cached: usize,
    /// Affiliations answered by the live provider.
    pub resolved: usize,
    pub not_found: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

impl UploadStats {
    pub fn located(&self) -> usize {
        self.cached + self.resolved
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub paper: Paper,
    /// One entry per affiliation, in the paper's affiliation order.
    pub geocoding: Vec<GeocodeReport>,
    pub stats: UploadStats,
}

/// Sequences parsing, extraction, geocoding and assembly.
///
/// Every collaborator is injected; [`UploadPipeline::from_config`] wires the
/// production ones.
pub struct UploadPipeline {
    parser: Arc<dyn DocumentParser>,
    extractor: Arc<dyn EntityExtractor>,
    geocoder: Arc<dyn Geocoder>,
    cache: Arc<GeoCache>,
    limits: UploadLimits,
    progress: ProgressCallback,
}

impl UploadPipeline {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        extractor: Arc<dyn EntityExtractor>,
        geocoder: Arc<dyn Geocoder>,
        cache: Arc<GeoCache>,
    ) -> Self {
        Self {
            parser,
            extractor,
            geocoder,
            cache,
            limits: UploadLimits::default(),
            progress: Arc::new(NoopProgressCallback),
        }
    }

    /// pdfium parser, configured extractor and geocoder, cache over `storage`.
    pub fn from_config(
        config: &PaperMapConfig,
        storage: Arc<dyn StorageProvider>,
    ) -> Result<Self, PaperMapError> {
        let extractor = build_extractor(config)?;
        let geocoder = build_geocoder(config)?;
        info!(
            "Upload pipeline: extractor={}, geocoder={}",
            extractor.name(),
            geocoder.name()
        );

        let mut pipeline = Self::new(
            Arc::new(PdfiumParser::new()),
            extractor,
            geocoder,
            Arc::new(GeoCache::new(storage)),
        )
        .with_limits(UploadLimits::from_config(config));

        if let Some(ref cb) = config.progress_callback {
            pipeline = pipeline.with_progress(Arc::clone(cb));
        }
        Ok(pipeline)
    }

    pub fn with_limits(mut self, limits: UploadLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn cache(&self) -> &GeoCache {
        &self.cache
    }

    /// Read a local PDF and run it through [`run`](Self::run).
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadOutcome, PaperMapError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => PaperMapError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => PaperMapError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.run(UploadRequest::new(bytes, file_name)).await
    }

    /// Run one upload to completion.
    pub async fn run(&self, request: UploadRequest) -> Result<UploadOutcome, PaperMapError> {
        let mut stage = UploadStage::Parsing;
        match self.run_stages(&request, &mut stage).await {
            Ok(outcome) => {
                self.progress.on_stage(UploadStage::Done, "Upload complete");
                self.progress.on_complete(&outcome);
                Ok(outcome)
            }
            Err(e) => {
                error!("Upload of '{}' failed while {}: {}", request.file_name, stage, e);
                self.progress.on_stage(UploadStage::Failed, &e.to_string());
                self.progress.on_failed(stage, &e);
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        request: &UploadRequest,
        stage: &mut UploadStage,
    ) -> Result<UploadOutcome, PaperMapError> {
        let start = Instant::now();
        let name = request.file_name.as_str();

        // ── Parsing ───────────────────────────────────────────────────────
        self.enter(stage, UploadStage::Parsing, format!("Parsing '{name}'"));
        self.limits.check(request)?;
        let document = self.parser.parse(&request.bytes, name).await?;
        if document.text.trim().is_empty() {
            return Err(PaperMapError::EmptyDocument {
                name: name.to_string(),
            });
        }
        info!(
            "Parsed '{}': {} pages, {} chars",
            name,
            document.page_count,
            document.text.chars().count()
        );

        // ── Extracting ────────────────────────────────────────────────────
        self.enter(
            stage,
            UploadStage::Extracting,
            format!("Extracting authors and affiliations ({})", self.extractor.name()),
        );
        let entities = self.extractor.extract(&document.text).await?;
        info!(
            "Extracted {} authors, {} affiliations from '{}'",
            entities.authors.len(),
            entities.affiliations.len(),
            name
        );

        // ── Geocoding ─────────────────────────────────────────────────────
        let total = entities.affiliations.len();
        self.enter(
            stage,
            UploadStage::Geocoding,
            format!("Geocoding {total} affiliations"),
        );
        let (affiliations, geocoding) = self.geocode_all(entities.affiliations).await;

        // ── Assembling ────────────────────────────────────────────────────
        self.enter(stage, UploadStage::Assembling, "Assembling paper".to_string());
        let title = document
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_file_name(name));
        let paper = Paper::new(title, entities.authors, affiliations);

        let count = |f: fn(&GeocodeSource) -> bool| geocoding.iter().filter(|r| f(&r.source)).count();
        let stats = UploadStats {
            page_count: document.page_count,
            authors: paper.authors.len(),
            affiliations: paper.affiliations.len(),
            cached: count(|s| matches!(s, GeocodeSource::Cache)),
            resolved: count(|s| matches!(s, GeocodeSource::Provider)),
            not_found: count(|s| matches!(s, GeocodeSource::NotFound)),
            failed: count(|s| matches!(s, GeocodeSource::Failed(_))),
            total_duration_ms: saturating_millis(start.elapsed()),
        };

        info!(
            "Paper {} ready: {}/{} affiliations located, {}ms",
            paper.id,
            stats.located(),
            stats.affiliations,
            stats.total_duration_ms
        );

        Ok(UploadOutcome {
            paper,
            geocoding,
            stats,
        })
    }

    fn enter(&self, stage: &mut UploadStage, next: UploadStage, message: String) {
        *stage = next;
        debug!("Upload stage → {}", next);
        self.progress.on_stage(next, &message);
    }

    /// Resolve candidates one at a time, in order.
    async fn geocode_all(
        &self,
        candidates: Vec<AffiliationCandidate>,
    ) -> (Vec<Affiliation>, Vec<GeocodeReport>) {
        let total = candidates.len();
        let mut affiliations = Vec::with_capacity(total);
        let mut reports = Vec::with_capacity(total);

        for (i, candidate) in candidates.into_iter().enumerate() {
            self.progress.on_geocode_item(i + 1, total, &candidate.name);
            let (geo_point, source) = self.geocode_one(&candidate.name).await;
            reports.push(GeocodeReport {
                affiliation: candidate.name.clone(),
                source,
                geo_point,
            });
            affiliations.push(candidate.locate(geo_point));
        }

        (affiliations, reports)
    }

    async fn geocode_one(&self, name: &str) -> (Option<GeoPoint>, GeocodeSource) {
        if let Some(point) = self.cache.get(name).await {
            debug!("Cache hit: {} → ({}, {})", name, point.lat(), point.lon());
            return (Some(point), GeocodeSource::Cache);
        }

        match self.geocoder.geocode(name).await {
            Ok(Some(point)) => {
                debug!("Geocoded: {} → ({}, {})", name, point.lat(), point.lon());
                self.cache.set(name, point).await;
                (Some(point), GeocodeSource::Provider)
            }
            Ok(None) => {
                warn!("No location found for '{}'", name);
                (None, GeocodeSource::NotFound)
            }
            Err(e) => {
                match self.geocoder.failure_policy() {
                    FailurePolicy::Soft => warn!("Geocoding '{}' failed: {}", name, e),
                    FailurePolicy::Hard => error!("Geocoding '{}' failed: {}", name, e),
                }
                (None, GeocodeSource::Failed(e))
            }
        }
    }
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`.
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// File name with a trailing `.pdf` (any case) removed.
pub fn title_from_file_name(file_name: &str) -> String {
    let name = file_name.trim();
    let stem = if name.to_ascii_lowercase().ends_with(".pdf") {
        &name[..name.len() - 4]
    } else {
        name
    };
    if stem.is_empty() {
        "Untitled".to_string()
    } else {
        stem.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_request(bytes: &[u8]) -> UploadRequest {
        UploadRequest::new(bytes.to_vec(), "paper.pdf")
    }

    #[test]
    fn title_fallback_strips_extension() {
        assert_eq!(title_from_file_name("deep-maps.pdf"), "deep-maps");
        assert_eq!(title_from_file_name("SCAN.PDF"), "SCAN");
        assert_eq!(title_from_file_name("notes.pdf.txt"), "notes.pdf.txt");
        assert_eq!(title_from_file_name(".pdf"), "Untitled");
        assert_eq!(title_from_file_name("論文.pdf"), "論文");
    }

    #[test]
    fn size_limit_is_checked_first() {
        let limits = UploadLimits {
            max_bytes: 8,
            ..Default::default()
        };
        let request = pdf_request(b"not a pdf at all").with_mime_type("text/plain");
        assert!(matches!(
            limits.check(&request),
            Err(PaperMapError::FileTooLarge { size: 16, limit: 8, .. })
        ));
    }

    #[test]
    fn mime_type_must_match_when_declared() {
        let limits = UploadLimits::default();
        assert!(matches!(
            limits.check(&pdf_request(b"%PDF-1.7").with_mime_type("image/png")),
            Err(PaperMapError::UnsupportedFileType { .. })
        ));
        assert!(limits.check(&pdf_request(b"%PDF-1.7").with_mime_type("Application/PDF; qs=1")).is_ok());
        assert!(limits.check(&pdf_request(b"%PDF-1.7")).is_ok());
    }

    #[test]
    fn magic_bytes_are_required() {
        match UploadLimits::default().check(&pdf_request(b"PK\x03\x04zip")) {
            Err(PaperMapError::NotAPdf { magic, .. }) => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(matches!(
            UploadLimits::default().check(&pdf_request(b"")),
            Err(PaperMapError::NotAPdf { .. })
        ));
    }

    #[test]
    fn durations_saturate_instead_of_wrapping() {
        assert_eq!(saturating_millis(Duration::from_millis(1500)), 1500);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    #[test]
    fn stage_names() {
        assert_eq!(UploadStage::Geocoding.to_string(), "geocoding");
        assert_eq!(serde_json::to_string(&UploadStage::Done).unwrap(), "\"done\"");
    }

    #[test]
    fn geocode_source_serialises_with_error() {
        let failed = GeocodeSource::Failed(GeocodeError::QuotaExceeded {
            provider: "google_maps".into(),
        });
        let v = serde_json::to_value(&failed).unwrap();
        assert_eq!(v["kind"], "failed");
        assert!(v["error"]["QuotaExceeded"].is_object());
        assert_eq!(serde_json::to_value(GeocodeSource::Cache).unwrap()["kind"], "cache");
    }
}
