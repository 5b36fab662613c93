//! Map marker records: one per located affiliation of each paper.

use crate::model::{GeoPoint, Paper};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What a map pin shows. `position` serialises as `[lat, lon]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMarker {
    pub paper_id: Uuid,
    pub title: String,
    pub authors: Vec<String>,
    pub affiliation: String,
    pub position: GeoPoint,
}

/// Flatten papers into markers, in paper then affiliation order.
/// Unlocated affiliations produce no marker.
pub fn markers_for(papers: &[Paper]) -> Vec<MapMarker> {
    papers
        .iter()
        .flat_map(|paper| {
            let authors: Vec<String> = paper.authors.iter().map(|a| a.name.clone()).collect();
            paper.affiliations.iter().filter_map(move |affiliation| {
                Some(MapMarker {
                    paper_id: paper.id,
                    title: paper.title.clone(),
                    authors: authors.clone(),
                    affiliation: affiliation.name().to_string(),
                    position: affiliation.geo_point()?,
                })
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AffiliationCandidate, Author};

    fn paper(title: &str, affiliations: Vec<(&str, Option<GeoPoint>)>) -> Paper {
        Paper::new(
            title,
            vec![Author::new("Jane Doe"), Author::new("John Smith")],
            affiliations
                .into_iter()
                .map(|(name, point)| AffiliationCandidate::new(name, None).locate(point))
                .collect(),
        )
    }

    #[test]
    fn one_marker_per_located_affiliation() {
        let tokyo = GeoPoint::new(35.0, 139.0).unwrap();
        let mit = GeoPoint::new(42.36, -71.09).unwrap();
        let a = paper("Maps", vec![("University of Tokyo", Some(tokyo)), ("Nowhere Lab", None)]);
        let b = paper("More Maps", vec![("MIT", Some(mit))]);

        let markers = markers_for(&[a.clone(), b.clone()]);
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].paper_id, a.id);
        assert_eq!(markers[0].affiliation, "University of Tokyo");
        assert_eq!(markers[0].authors, ["Jane Doe", "John Smith"]);
        assert_eq!(markers[1].title, "More Maps");
        assert_eq!(markers[1].position, mit);
    }

    #[test]
    fn unlocated_papers_have_no_markers() {
        assert!(markers_for(&[paper("Lost", vec![("Somewhere", None)])]).is_empty());
        assert!(markers_for(&[]).is_empty());
    }

    #[test]
    fn position_serialises_as_pair() {
        let p = paper("Maps", vec![("University of Tokyo", Some(GeoPoint::new(35.0, 139.0).unwrap()))]);
        let v = serde_json::to_value(&markers_for(&[p])[0]).unwrap();
        assert_eq!(v["position"], serde_json::json!([35.0, 139.0]));
        assert!(v.get("paperId").is_some());
    }
}
