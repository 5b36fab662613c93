use super::GeoPoint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An institution as produced by entity extraction, before geocoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffiliationCandidate {
    pub name: String,
    pub country: Option<String>,
    pub city: Option<String>,
}

impl AffiliationCandidate {
    pub fn new(name: impl Into<String>, country: Option<String>) -> Self {
        Self {
            name: name.into(),
            country,
            city: None,
        }
    }

    /// Finish the geocoding phase. `None` records that no location was found.
    pub fn locate(self, geo_point: Option<GeoPoint>) -> Affiliation {
        Affiliation {
            name: self.name,
            country: self.country,
            city: self.city,
            geo_point,
        }
    }

    /// Shorthand for `locate(None)`.
    pub fn unlocated(self) -> Affiliation {
        self.locate(None)
    }
}

/// An institution as stored on a [`Paper`], optionally geolocated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliation {
    name: String,
    country: Option<String>,
    city: Option<String>,
    geo_point: Option<GeoPoint>,
}

impl Affiliation {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn geo_point(&self) -> Option<GeoPoint> {
        self.geo_point
    }

    pub fn has_geo_location(&self) -> bool {
        self.geo_point.is_some()
    }
}

/// A paper author. `affiliation` is filled independently of
/// [`Paper::affiliations`]; no link between the two is enforced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub affiliation: Option<Affiliation>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }
}

/// The root aggregate: persisted and deleted as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paper {
    pub id: Uuid,
    pub title: String,
    pub authors: Vec<Author>,
    pub affiliations: Vec<Affiliation>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl Paper {
    /// Assemble a new paper with a fresh id and the current time.
    pub fn new(title: impl Into<String>, authors: Vec<Author>, affiliations: Vec<Affiliation>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            authors,
            affiliations,
            pdf_url: None,
            uploaded_at: Utc::now(),
        }
    }

    pub fn has_geo_location(&self) -> bool {
        self.affiliations.iter().any(Affiliation::has_geo_location)
    }

    /// Countries named by the affiliations, deduplicated in first-seen order.
    pub fn unique_countries(&self) -> Vec<&str> {
        let mut countries: Vec<&str> = Vec::new();
        for country in self.affiliations.iter().filter_map(Affiliation::country) {
            if !countries.contains(&country) {
                countries.push(country);
            }
        }
        countries
    }

    pub fn geo_points(&self) -> Vec<GeoPoint> {
        self.affiliations.iter().filter_map(Affiliation::geo_point).collect()
    }
}
