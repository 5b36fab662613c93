//! Error types for the papermap library.
//!
//! Three error types cover three failure scopes:
//!
//! * [`PaperMapError`]: **Fatal**, the upload (or repository call) cannot
//!   proceed. Bad input file, empty document, unparsable model output,
//!   misconfigured LLM provider, storage failure.
//!
//! * [`GeocodeError`]: **Non-fatal**, resolving one affiliation failed.
//!   Recorded in [`crate::upload::GeocodeReport`] so the upload still
//!   produces a paper with that affiliation left unlocated.
//!
//! * [`StorageError`]: a key-value backend failed. Propagated from the
//!   repository as [`PaperMapError::Storage`]; swallowed only inside
//!   [`crate::geocoding::GeoCache`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the papermap library.
#[derive(Debug, Error)]
pub enum PaperMapError {
    // ── Domain errors ─────────────────────────────────────────────────────
    /// Latitude or longitude outside the valid range.
    #[error("Invalid coordinate ({lat}, {lon}): latitude must be within [-90, 90] and longitude within [-180, 180]")]
    InvalidCoordinate { lat: f64, lon: f64 },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// Upload exceeds the configured size limit.
    #[error("File '{name}' is {size} bytes; the upload limit is {limit} bytes")]
    FileTooLarge { name: String, size: usize, limit: usize },

    /// Declared MIME type is not accepted.
    #[error("File '{name}' has type '{mime}'; only '{accepted}' is accepted")]
    UnsupportedFileType {
        name: String,
        mime: String,
        accepted: String,
    },

    /// The bytes do not start with the PDF magic number.
    #[error("File is not a valid PDF: '{name}'\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not open the document.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// The document contained no extractable text.
    #[error("No text could be extracted from '{name}'. Scanned PDFs without a text layer are not supported.")]
    EmptyDocument { name: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first use.\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API returned an error.
    #[error("LLM API error: {message}")]
    LlmApiError { message: String },

    /// Model output was missing or not the expected JSON document.
    #[error("Entity extraction failed: {detail}")]
    Extraction { detail: String },

    // ── Storage errors ────────────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] StorageError),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single geocoding attempt.
///
/// The commercial provider distinguishes capacity problems
/// ([`GeocodeError::QuotaExceeded`]) from access problems
/// ([`GeocodeError::RequestDenied`], [`GeocodeError::NotConfigured`]) so an
/// operator can tell them apart from a plain "not found".
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum GeocodeError {
    /// Required credential is missing. Raised before any request is sent.
    #[error("Geocoder '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    /// Provider reported that the request quota is exhausted.
    #[error("Geocoder '{provider}' quota exceeded")]
    QuotaExceeded { provider: String },

    /// Provider refused the request (bad key, API not enabled, ...).
    #[error("Geocoder '{provider}' denied the request: {detail}")]
    RequestDenied { provider: String, detail: String },

    /// Network or decoding failure talking to the provider.
    #[error("Geocoder '{provider}' request failed: {detail}")]
    Transport { provider: String, detail: String },
}

impl GeocodeError {
    /// `true` when the same request may succeed later without operator action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GeocodeError::QuotaExceeded { .. } | GeocodeError::Transport { .. }
        )
    }
}

/// Failure of a key-value storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed to execute an operation.
    #[error("Storage {operation} failed: {detail}")]
    Backend {
        operation: &'static str,
        detail: String,
    },

    /// A stored value could not be encoded or decoded.
    #[error("Stored value for '{key}' could not be encoded: {detail}")]
    Encoding { key: String, detail: String },
}

impl StorageError {
    pub(crate) fn backend(operation: &'static str, err: impl std::fmt::Display) -> Self {
        StorageError::Backend {
            operation,
            detail: err.to_string(),
        }
    }
}
