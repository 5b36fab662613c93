//! Google Maps Geocoding API provider.
//!
//! Requires an API key. Unlike Nominatim this provider fails loudly: a
//! missing key, an exhausted quota or a denied request all become
//! [`GeocodeError`]s. `ZERO_RESULTS`, unknown statuses and non-2xx HTTP
//! responses are "not found".

use super::{FailurePolicy, Geocoder};
use crate::error::GeocodeError;
use crate::model::GeoPoint;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

pub const GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

const PROVIDER: &str = "google_maps";

pub struct GoogleMapsGeocoder {
    client: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl GoogleMapsGeocoder {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: GOOGLE_GEOCODE_URL.to_string(),
        }
    }

    /// Point at a different endpoint (a proxy or a local fake).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

/// Map a Geocoding API response body to a result.
fn interpret_response(body: &Value) -> Result<Option<GeoPoint>, GeocodeError> {
    let status = body.get("status").and_then(Value::as_str).unwrap_or_default();
    match status {
        "OK" => {
            let location = &body["results"][0]["geometry"]["location"];
            let point = match (location["lat"].as_f64(), location["lng"].as_f64()) {
                (Some(lat), Some(lng)) => GeoPoint::new(lat, lng).ok(),
                _ => None,
            };
            if point.is_none() {
                warn!("Google Maps returned OK without usable coordinates");
            }
            Ok(point)
        }
        "ZERO_RESULTS" => Ok(None),
        "OVER_QUERY_LIMIT" => Err(GeocodeError::QuotaExceeded {
            provider: PROVIDER.to_string(),
        }),
        "REQUEST_DENIED" => Err(GeocodeError::RequestDenied {
            provider: PROVIDER.to_string(),
            detail: body
                .get("error_message")
                .and_then(Value::as_str)
                .unwrap_or("request denied")
                .to_string(),
        }),
        other => {
            debug!("Google Maps status '{}' treated as not found", other);
            Ok(None)
        }
    }
}

#[async_trait]
impl Geocoder for GoogleMapsGeocoder {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Hard
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let key = self.api_key.as_deref().ok_or_else(|| GeocodeError::NotConfigured {
            provider: PROVIDER.to_string(),
            hint: "set GOOGLE_MAPS_API_KEY".to_string(),
        })?;

        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        let transport = |e: reqwest::Error| GeocodeError::Transport {
            provider: PROVIDER.to_string(),
            detail: e.to_string(),
        };

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", address), ("key", key)])
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            warn!("Google Maps returned HTTP {} for '{}'", response.status(), address);
            return Ok(None);
        }

        let body: Value = response.json().await.map_err(transport)?;
        interpret_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ok_status_yields_first_location() {
        let body = json!({
            "status": "OK",
            "results": [
                {"geometry": {"location": {"lat": 35.7126, "lng": 139.761}}},
                {"geometry": {"location": {"lat": 0.0, "lng": 0.0}}}
            ]
        });
        assert_eq!(interpret_response(&body), Ok(Some(GeoPoint::new(35.7126, 139.761).unwrap())));
    }

    #[test]
    fn zero_results_and_unknown_status_are_not_found() {
        assert_eq!(interpret_response(&json!({"status": "ZERO_RESULTS", "results": []})), Ok(None));
        assert_eq!(interpret_response(&json!({"status": "INVALID_REQUEST"})), Ok(None));
        assert_eq!(interpret_response(&json!({})), Ok(None));
    }

    #[test]
    fn ok_without_coordinates_is_not_found() {
        assert_eq!(interpret_response(&json!({"status": "OK", "results": []})), Ok(None));
        let body = json!({"status": "OK", "results": [{"geometry": {"location": {"lat": 91.0, "lng": 0.0}}}]});
        assert_eq!(interpret_response(&body), Ok(None));
    }

    #[test]
    fn quota_and_denial_are_errors() {
        assert_eq!(
            interpret_response(&json!({"status": "OVER_QUERY_LIMIT"})),
            Err(GeocodeError::QuotaExceeded { provider: "google_maps".into() })
        );
        let denied = interpret_response(&json!({
            "status": "REQUEST_DENIED",
            "error_message": "The provided API key is invalid."
        }));
        assert_eq!(
            denied,
            Err(GeocodeError::RequestDenied {
                provider: "google_maps".into(),
                detail: "The provided API key is invalid.".into(),
            })
        );
    }

    #[tokio::test]
    async fn missing_key_is_checked_before_input() {
        let g = GoogleMapsGeocoder::new(reqwest::Client::new(), None);
        assert!(matches!(g.geocode("").await, Err(GeocodeError::NotConfigured { .. })));
        assert!(matches!(g.geocode("MIT").await, Err(GeocodeError::NotConfigured { .. })));

        let blank = GoogleMapsGeocoder::new(reqwest::Client::new(), Some("  ".into()));
        assert!(matches!(blank.geocode("MIT").await, Err(GeocodeError::NotConfigured { .. })));
    }

    #[tokio::test]
    async fn blank_address_with_key_is_not_found() {
        let g = GoogleMapsGeocoder::new(reqwest::Client::new(), Some("k".into()))
            .with_endpoint("http://127.0.0.1:9/unused");
        assert_eq!(g.geocode("  ").await, Ok(None));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(2))
            .build()
            .unwrap();
        let g = GoogleMapsGeocoder::new(client, Some("k".into())).with_endpoint("http://127.0.0.1:1/geocode");
        assert!(matches!(g.geocode("MIT").await, Err(GeocodeError::Transport { .. })));
    }
}
