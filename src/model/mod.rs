//! Domain model: coordinates, affiliations, authors and the `Paper` aggregate.
//!
//! ## Two-phase affiliations
//!
//! The entity extractor only knows names and countries; coordinates arrive
//! later from the geocoding stage. That lifecycle is encoded in two types:
//!
//! ```text
//! AffiliationCandidate ──locate(Option<GeoPoint>)──▶ Affiliation
//!   (extracted, unlocated)                           (stored, maybe located)
//! ```
//!
//! [`Affiliation`] has no public constructor besides
//! [`AffiliationCandidate::locate`] and deserialisation, so a pipeline cannot
//! build a stored paper without passing through the geocoding decision.

mod geo_point;
mod paper;

pub use geo_point::{GeoPoint, EARTH_RADIUS_KM};
pub use paper::{Affiliation, AffiliationCandidate, Author, Paper};
