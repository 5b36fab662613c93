//! Progress-callback trait for upload pipeline events.
//!
//! Inject an [`Arc<dyn UploadProgressCallback>`] via
//! [`crate::config::PaperMapConfigBuilder::progress_callback`] to receive a
//! human-readable message at each stage transition and one event per
//! affiliation during geocoding. Events are informational; the pipeline's
//! result never depends on them.
//!
//! # Example
//!
//! ```rust
//! use papermap::{PaperMapConfig, UploadProgressCallback, UploadStage};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl UploadProgressCallback for Printer {
//!     fn on_stage(&self, stage: UploadStage, message: &str) {
//!         eprintln!("[{stage}] {message}");
//!     }
//! }
//!
//! let config = PaperMapConfig::builder()
//!     .progress_callback(Arc::new(Printer))
//!     .build()
//!     .unwrap();
//! ```

use crate::error::PaperMapError;
use crate::upload::{UploadOutcome, UploadStage};
use std::sync::Arc;

/// Called by [`crate::upload::UploadPipeline`] as an upload advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait UploadProgressCallback: Send + Sync {
    /// Called on entry to each stage, in pipeline order.
    fn on_stage(&self, stage: UploadStage, message: &str) {
        let _ = (stage, message);
    }

    /// Called before affiliation `index` (1-based) of `total` is resolved.
    fn on_geocode_item(&self, index: usize, total: usize, affiliation: &str) {
        let _ = (index, total, affiliation);
    }

    /// Called once after the paper has been assembled.
    fn on_complete(&self, outcome: &UploadOutcome) {
        let _ = outcome;
    }

    /// Called once when the upload aborts in `stage`.
    fn on_failed(&self, stage: UploadStage, error: &PaperMapError) {
        let _ = (stage, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl UploadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::PaperMapConfig`].
pub type ProgressCallback = Arc<dyn UploadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage(UploadStage::Parsing, "reading");
        cb.on_geocode_item(1, 2, "MIT");
        cb.on_failed(UploadStage::Extracting, &PaperMapError::Internal("x".into()));
    }
}
