//! Geocoding: affiliation name → [`GeoPoint`].
//!
//! Two providers sit behind the [`Geocoder`] trait with opposite failure
//! policies, stated explicitly through [`Geocoder::failure_policy`]:
//!
//! | Provider | Credential | Policy | Not found | Provider error |
//! |----------|-----------|--------|-----------|----------------|
//! | [`NominatimGeocoder`]  | none     | [`FailurePolicy::Soft`] | `Ok(None)` | `Ok(None)` (logged) |
//! | [`GoogleMapsGeocoder`] | API key  | [`FailurePolicy::Hard`] | `Ok(None)` | `Err(GeocodeError)` |
//!
//! [`GeoCache`] sits in front of whichever provider is configured.

mod cache;
mod google;
mod nominatim;

pub use cache::{normalize_address, GeoCache, GEO_KEY_PREFIX};
pub use google::{GoogleMapsGeocoder, GOOGLE_GEOCODE_URL};
pub use nominatim::{NominatimGeocoder, Throttle};

use crate::config::{GeocoderKind, PaperMapConfig};
use crate::error::{GeocodeError, PaperMapError};
use crate::model::GeoPoint;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// How a provider reports trouble other than "no such place".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Best effort: every failure degrades to `Ok(None)`.
    Soft,
    /// Misconfiguration and provider refusals surface as `Err`.
    Hard,
}

/// Resolve a free-text address to coordinates.
///
/// Implementations return `Ok(None)` for empty or whitespace-only input
/// without touching the network.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;

    fn failure_policy(&self) -> FailurePolicy;

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}

/// Build the geocoder selected by `config.geocoder`.
pub fn build_geocoder(config: &PaperMapConfig) -> Result<Arc<dyn Geocoder>, PaperMapError> {
    let client = http_client(config)?;
    let geocoder: Arc<dyn Geocoder> = match config.geocoder {
        GeocoderKind::Nominatim => Arc::new(NominatimGeocoder::new(
            client,
            &config.nominatim_base_url,
            &config.nominatim_user_agent,
            Duration::from_millis(config.nominatim_rate_limit_ms),
        )),
        GeocoderKind::GoogleMaps => Arc::new(GoogleMapsGeocoder::new(
            client,
            config.google_maps_api_key.clone(),
        )),
    };
    Ok(geocoder)
}

pub(crate) fn http_client(config: &PaperMapConfig) -> Result<reqwest::Client, PaperMapError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_secs))
        .build()
        .map_err(|e| PaperMapError::Internal(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_configured_provider() {
        let nominatim = build_geocoder(&PaperMapConfig::default()).unwrap();
        assert_eq!(nominatim.name(), "nominatim");
        assert_eq!(nominatim.failure_policy(), FailurePolicy::Soft);

        let config = PaperMapConfig::builder()
            .geocoder(GeocoderKind::GoogleMaps)
            .build()
            .unwrap();
        let google = build_geocoder(&config).unwrap();
        assert_eq!(google.name(), "google_maps");
        assert_eq!(google.failure_policy(), FailurePolicy::Hard);
    }
}
