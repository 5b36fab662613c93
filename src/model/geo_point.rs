use crate::error::PaperMapError;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by [`GeoPoint::distance_to`].
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in decimal degrees.
///
/// Serialises as the ordered pair `[lat, lon]`; deserialisation runs the same
/// range check as [`GeoPoint::new`], so an out-of-range value read back from
/// storage is rejected rather than silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    /// Build a point, failing with [`PaperMapError::InvalidCoordinate`] when
    /// `lat ∉ [-90, 90]` or `lon ∉ [-180, 180]` (NaN included).
    pub fn new(lat: f64, lon: f64) -> Result<Self, PaperMapError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(PaperMapError::InvalidCoordinate { lat, lon });
        }
        Ok(Self { lat, lon })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lon(&self) -> f64 {
        self.lon
    }

    pub fn to_array(&self) -> [f64; 2] {
        [self.lat, self.lon]
    }

    pub fn from_array(coords: [f64; 2]) -> Result<Self, PaperMapError> {
        Self::new(coords[0], coords[1])
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);

        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

impl TryFrom<[f64; 2]> for GeoPoint {
    type Error = PaperMapError;

    fn try_from(coords: [f64; 2]) -> Result<Self, Self::Error> {
        Self::from_array(coords)
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        point.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> GeoPoint {
        GeoPoint::new(lat, lon).unwrap()
    }

    #[test]
    fn accepts_boundary_values() {
        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (0.0, 0.0), (35.6762, 139.6503)] {
            let point = p(lat, lon);
            assert_eq!(GeoPoint::from_array(point.to_array()).unwrap(), point);
        }
    }

    #[test]
    fn rejects_out_of_range() {
        for (lat, lon) in [(90.0001, 0.0), (-91.0, 0.0), (0.0, 180.5), (0.0, -181.0), (f64::NAN, 0.0)] {
            let err = GeoPoint::new(lat, lon).unwrap_err();
            assert!(matches!(err, PaperMapError::InvalidCoordinate { .. }), "({lat}, {lon})");
        }
    }

    #[test]
    fn distance_is_symmetric_and_zero_on_self() {
        let tokyo = p(35.6762, 139.6503);
        let paris = p(48.8566, 2.3522);
        assert!((tokyo.distance_to(&paris) - paris.distance_to(&tokyo)).abs() < 1e-9);
        assert_eq!(tokyo.distance_to(&tokyo), 0.0);
    }

    #[test]
    fn distance_tokyo_osaka_is_about_400_km() {
        let tokyo = p(35.6762, 139.6503);
        let osaka = p(34.6937, 135.5023);
        let d = tokyo.distance_to(&osaka);
        assert!((390.0..410.0).contains(&d), "got {d}");
    }

    #[test]
    fn serialises_as_pair() {
        let json = serde_json::to_string(&p(35.0, 139.0)).unwrap();
        assert_eq!(json, "[35.0,139.0]");
        let back: GeoPoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p(35.0, 139.0));
    }

    #[test]
    fn deserialising_out_of_range_pair_fails() {
        assert!(serde_json::from_str::<GeoPoint>("[120.0, 0.0]").is_err());
        assert!(serde_json::from_str::<GeoPoint>("[1.0]").is_err());
    }
}
