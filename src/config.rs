//! Configuration for the extraction-and-enrichment pipeline.
//!
//! Every knob lives in [`PaperMapConfig`], built via its
//! [`PaperMapConfigBuilder`] or read from the environment with
//! [`PaperMapConfig::from_env`]. A config is built once per process and handed
//! to each component at construction; nothing reads the environment later.

use crate::error::PaperMapError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const DEFAULT_USER_AGENT: &str = "PaperMap/1.0";
pub const DEFAULT_LLM_PROVIDER: &str = "gemini";
pub const DEFAULT_LLM_MODEL: &str = "gemini-2.5-flash-lite";
pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Configuration for uploads, geocoding, extraction and storage.
///
/// # Example
/// ```rust
/// use papermap::{GeocoderKind, PaperMapConfig};
///
/// let config = PaperMapConfig::builder()
///     .geocoder(GeocoderKind::GoogleMaps)
///     .google_maps_api_key("AIza...")
///     .build()
///     .unwrap();
/// assert_eq!(config.nominatim_rate_limit_ms, 1000);
/// ```
#[derive(Clone)]
pub struct PaperMapConfig {
    /// Base URL of the Nominatim instance. Default: the public OSM server.
    pub nominatim_base_url: String,

    /// Minimum gap between two Nominatim requests, process-wide. Default: 1000.
    ///
    /// The public server's usage policy allows one request per second.
    pub nominatim_rate_limit_ms: u64,

    /// `User-Agent` header sent to Nominatim. Default: `PaperMap/1.0`.
    pub nominatim_user_agent: String,

    /// Google Maps Geocoding API key. Required when `geocoder` is `GoogleMaps`.
    pub google_maps_api_key: Option<String>,

    /// Which geocoding provider resolves affiliations. Default: Nominatim.
    pub geocoder: GeocoderKind,

    /// Which entity extractor reads the PDF text. Default: Llm.
    pub extractor: ExtractorKind,

    /// LLM provider name passed to `ProviderFactory`. Default: `gemini`.
    pub llm_provider_name: String,

    /// LLM model identifier. Default: `gemini-2.5-flash-lite`.
    pub llm_model: String,

    /// API key for the default Gemini provider (`GEMINI_API_KEY`).
    pub llm_api_key: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `llm_provider_name`.
    pub llm_provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub llm_temperature: f32,

    /// Maximum tokens the model may generate. Default: 1000.
    pub llm_max_output_tokens: usize,

    /// Characters of PDF text sent to the model. Default: 100 000.
    pub llm_max_input_chars: usize,

    /// Largest accepted upload. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Only MIME type accepted for uploads. Default: `application/pdf`.
    pub accepted_mime_type: String,

    /// SQLite database file. Default: `<data dir>/papermap/papermap.db`.
    pub database_path: PathBuf,

    /// Timeout for every outbound HTTP request. Default: 30.
    pub http_timeout_secs: u64,

    /// Optional stage/progress observer.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for PaperMapConfig {
    fn default() -> Self {
        Self {
            nominatim_base_url: DEFAULT_NOMINATIM_URL.to_string(),
            nominatim_rate_limit_ms: 1000,
            nominatim_user_agent: DEFAULT_USER_AGENT.to_string(),
            google_maps_api_key: None,
            geocoder: GeocoderKind::default(),
            extractor: ExtractorKind::default(),
            llm_provider_name: DEFAULT_LLM_PROVIDER.to_string(),
            llm_model: DEFAULT_LLM_MODEL.to_string(),
            llm_api_key: None,
            llm_provider: None,
            llm_temperature: 0.2,
            llm_max_output_tokens: 1000,
            llm_max_input_chars: 100_000,
            max_upload_bytes: 10 * 1024 * 1024,
            accepted_mime_type: PDF_MIME_TYPE.to_string(),
            database_path: default_database_path(),
            http_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for PaperMapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaperMapConfig")
            .field("nominatim_base_url", &self.nominatim_base_url)
            .field("nominatim_rate_limit_ms", &self.nominatim_rate_limit_ms)
            .field("nominatim_user_agent", &self.nominatim_user_agent)
            .field("google_maps_api_key", &self.google_maps_api_key.as_ref().map(|_| "<redacted>"))
            .field("geocoder", &self.geocoder)
            .field("extractor", &self.extractor)
            .field("llm_provider_name", &self.llm_provider_name)
            .field("llm_model", &self.llm_model)
            .field("llm_api_key", &self.llm_api_key.as_ref().map(|_| "<redacted>"))
            .field("llm_provider", &self.llm_provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("llm_temperature", &self.llm_temperature)
            .field("llm_max_output_tokens", &self.llm_max_output_tokens)
            .field("llm_max_input_chars", &self.llm_max_input_chars)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("accepted_mime_type", &self.accepted_mime_type)
            .field("database_path", &self.database_path)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}

impl PaperMapConfig {
    /// Create a new builder for `PaperMapConfig`.
    pub fn builder() -> PaperMapConfigBuilder {
        PaperMapConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read configuration from process environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `PAPERMAP_NOMINATIM_URL` | `nominatim_base_url` |
    /// | `PAPERMAP_NOMINATIM_RATE_LIMIT_MS` | `nominatim_rate_limit_ms` |
    /// | `PAPERMAP_NOMINATIM_USER_AGENT` | `nominatim_user_agent` |
    /// | `GOOGLE_MAPS_API_KEY` | `google_maps_api_key` |
    /// | `PAPERMAP_GEOCODER` | `geocoder` |
    /// | `PAPERMAP_EXTRACTOR` | `extractor` |
    /// | `PAPERMAP_LLM_PROVIDER` | `llm_provider_name` |
    /// | `PAPERMAP_LLM_MODEL` | `llm_model` |
    /// | `GEMINI_API_KEY` | `llm_api_key` |
    /// | `PAPERMAP_MAX_UPLOAD_BYTES` | `max_upload_bytes` |
    /// | `PAPERMAP_DB_PATH` | `database_path` |
    /// | `PAPERMAP_HTTP_TIMEOUT_SECS` | `http_timeout_secs` |
    pub fn from_env() -> Result<Self, PaperMapError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PaperMapError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut b = Self::builder();

        if let Some(v) = get("PAPERMAP_NOMINATIM_URL") {
            b = b.nominatim_base_url(v);
        }
        if let Some(v) = get("PAPERMAP_NOMINATIM_RATE_LIMIT_MS") {
            b = b.nominatim_rate_limit_ms(parse_var("PAPERMAP_NOMINATIM_RATE_LIMIT_MS", &v)?);
        }
        if let Some(v) = get("PAPERMAP_NOMINATIM_USER_AGENT") {
            b = b.nominatim_user_agent(v);
        }
        if let Some(v) = get("GOOGLE_MAPS_API_KEY") {
            b = b.google_maps_api_key(v);
        }
        if let Some(v) = get("PAPERMAP_GEOCODER") {
            b = b.geocoder(parse_var("PAPERMAP_GEOCODER", &v)?);
        }
        if let Some(v) = get("PAPERMAP_EXTRACTOR") {
            b = b.extractor(parse_var("PAPERMAP_EXTRACTOR", &v)?);
        }
        if let Some(v) = get("PAPERMAP_LLM_PROVIDER") {
            b = b.llm_provider_name(v);
        }
        if let Some(v) = get("PAPERMAP_LLM_MODEL") {
            b = b.llm_model(v);
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            b = b.llm_api_key(v);
        }
        if let Some(v) = get("PAPERMAP_MAX_UPLOAD_BYTES") {
            b = b.max_upload_bytes(parse_var("PAPERMAP_MAX_UPLOAD_BYTES", &v)?);
        }
        if let Some(v) = get("PAPERMAP_DB_PATH") {
            b = b.database_path(v);
        }
        if let Some(v) = get("PAPERMAP_HTTP_TIMEOUT_SECS") {
            b = b.http_timeout_secs(parse_var("PAPERMAP_HTTP_TIMEOUT_SECS", &v)?);
        }

        b.build()
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T, PaperMapError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PaperMapError::InvalidConfig(format!("{name}='{value}': {e}")))
}

fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(std::env::temp_dir)
        .join("papermap")
        .join("papermap.db")
}

/// Builder for [`PaperMapConfig`].
#[derive(Debug)]
pub struct PaperMapConfigBuilder {
    config: PaperMapConfig,
}

impl PaperMapConfigBuilder {
    pub fn nominatim_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.nominatim_base_url = url.into();
        self
    }

    pub fn nominatim_rate_limit_ms(mut self, ms: u64) -> Self {
        self.config.nominatim_rate_limit_ms = ms;
        self
    }

    pub fn nominatim_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.nominatim_user_agent = ua.into();
        self
    }

    pub fn google_maps_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.google_maps_api_key = Some(key.into());
        self
    }

    pub fn geocoder(mut self, kind: GeocoderKind) -> Self {
        self.config.geocoder = kind;
        self
    }

    pub fn extractor(mut self, kind: ExtractorKind) -> Self {
        self.config.extractor = kind;
        self
    }

    pub fn llm_provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.llm_provider_name = name.into();
        self
    }

    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.config.llm_model = model.into();
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm_api_key = Some(key.into());
        self
    }

    pub fn llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.llm_provider = Some(provider);
        self
    }

    pub fn llm_temperature(mut self, t: f32) -> Self {
        self.config.llm_temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn llm_max_output_tokens(mut self, n: usize) -> Self {
        self.config.llm_max_output_tokens = n.max(1);
        self
    }

    pub fn llm_max_input_chars(mut self, n: usize) -> Self {
        self.config.llm_max_input_chars = n;
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn accepted_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.config.accepted_mime_type = mime.into();
        self
    }

    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.database_path = path.into();
        self
    }

    pub fn http_timeout_secs(mut self, secs: u64) -> Self {
        self.config.http_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PaperMapConfig, PaperMapError> {
        let c = &self.config;
        if !c.nominatim_base_url.starts_with("http://") && !c.nominatim_base_url.starts_with("https://") {
            return Err(PaperMapError::InvalidConfig(format!(
                "Nominatim URL must be http(s), got '{}'",
                c.nominatim_base_url
            )));
        }
        if c.nominatim_user_agent.trim().is_empty() {
            return Err(PaperMapError::InvalidConfig(
                "Nominatim user agent must not be empty".into(),
            ));
        }
        if c.max_upload_bytes == 0 {
            return Err(PaperMapError::InvalidConfig(
                "Max upload size must be ≥ 1 byte".into(),
            ));
        }
        if c.llm_max_input_chars == 0 {
            return Err(PaperMapError::InvalidConfig(
                "LLM input budget must be ≥ 1 character".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Geocoding provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocoderKind {
    /// OpenStreetMap Nominatim: free, throttled, fails soft. (default)
    #[default]
    Nominatim,
    /// Google Maps Geocoding API: needs a key, fails hard.
    GoogleMaps,
}

impl FromStr for GeocoderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominatim" | "osm" => Ok(GeocoderKind::Nominatim),
            "google" | "google_maps" | "google-maps" => Ok(GeocoderKind::GoogleMaps),
            other => Err(format!("unknown geocoder '{other}' (expected nominatim or google)")),
        }
    }
}

/// Entity extractor selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Hosted language model; unresolvable provider is an error. (default)
    #[default]
    Llm,
    /// Local keyword and name-pattern heuristics only.
    Heuristic,
    /// Language model when a provider resolves, heuristics otherwise.
    Auto,
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "llm" => Ok(ExtractorKind::Llm),
            "heuristic" | "regex" | "local" => Ok(ExtractorKind::Heuristic),
            "auto" => Ok(ExtractorKind::Auto),
            other => Err(format!("unknown extractor '{other}' (expected llm, heuristic or auto)")),
        }
    }
}
