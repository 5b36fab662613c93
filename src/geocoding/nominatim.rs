//! OpenStreetMap Nominatim provider.
//!
//! `GET {base}/search?q=<address>&format=json&limit=1` with a configured
//! `User-Agent`. Requests are serialised through a [`Throttle`] so that at
//! most one leaves the process per interval, whichever task issues it.

use super::{FailurePolicy, Geocoder};
use crate::error::GeocodeError;
use crate::model::GeoPoint;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

const PROVIDER: &str = "nominatim";

/// Enforces a minimum spacing between consecutive calls.
///
/// The lock is held while sleeping, so concurrent callers queue up behind
/// each other instead of all waking at the same deadline.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Wait until `interval` has passed since the previous call returned.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                debug!("Nominatim throttle: sleeping {:?}", ready_at - Instant::now());
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[derive(Debug, Deserialize)]
struct Place {
    lat: String,
    lon: String,
}

/// Best-effort, throttled geocoder. Never returns `Err`.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    search_url: String,
    user_agent: String,
    throttle: Throttle,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: &str, user_agent: &str, interval: Duration) -> Self {
        Self {
            client,
            search_url: format!("{}/search", base_url.trim_end_matches('/')),
            user_agent: user_agent.to_string(),
            throttle: Throttle::new(interval),
        }
    }

    async fn search(&self, address: &str) -> Result<Option<GeoPoint>, reqwest::Error> {
        self.throttle.wait().await;

        let response = self
            .client
            .get(&self.search_url)
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        if !response.status().is_success() {
            warn!("Nominatim returned HTTP {} for '{}'", response.status(), address);
            return Ok(None);
        }

        let places: Vec<Place> = response.json().await?;
        Ok(first_point(&places))
    }
}

/// First place with parseable, in-range coordinates.
fn first_point(places: &[Place]) -> Option<GeoPoint> {
    let place = places.first()?;
    let lat = place.lat.trim().parse::<f64>().ok()?;
    let lon = place.lon.trim().parse::<f64>().ok()?;
    GeoPoint::new(lat, lon).ok()
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::Soft
    }

    async fn geocode(&self, address: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let address = address.trim();
        if address.is_empty() {
            return Ok(None);
        }

        match self.search(address).await {
            Ok(Some(point)) => {
                debug!("Nominatim: '{}' → ({}, {})", address, point.lat(), point.lon());
                Ok(Some(point))
            }
            Ok(None) => {
                debug!("Nominatim: no result for '{}'", address);
                Ok(None)
            }
            Err(e) => {
                warn!("Nominatim request for '{}' failed: {}", address, e);
                Ok(None)
            }
        }
    }
}
