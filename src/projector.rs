//! Projection of deduplicated candidates onto the track.

use std::hash::{Hash, Hasher};

use crate::geo_utils::haversine_km;
use crate::{Candidate, Category, GpsPoint, Track};

/// Hashable `(lat, lon)` key for places and their road routes.
///
/// Compares the exact bit patterns, so only identical coordinates match.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct PlaceKey {
    pub latitude: f64,
    pub longitude: f64,
}

impl PlaceKey {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl PartialEq for PlaceKey {
    fn eq(&self, other: &Self) -> bool {
        self.latitude.to_bits() == other.latitude.to_bits()
            && self.longitude.to_bits() == other.longitude.to_bits()
    }
}

impl Eq for PlaceKey {}

impl Hash for PlaceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.latitude.to_bits().hash(state);
        self.longitude.to_bits().hash(state);
    }
}

/// A candidate resolved against the track.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct Place {
    /// Name from the search index, or the `Unnamed <Category>` placeholder
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub category: Category,
    /// Distance to the nearest point of the track, km, 3 decimals
    pub distance_km: f64,
    /// Arc-length position of the nearest track point. Ordering only.
    pub position: f64,
    /// Whether the place goes into the output. Defaults to true.
    pub included: bool,
}

impl Place {
    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    pub fn key(&self) -> PlaceKey {
        PlaceKey::new(self.latitude, self.longitude)
    }

    pub fn set_included(&mut self, included: bool) {
        self.included = included;
    }

    /// Flip the inclusion flag and return the new value.
    pub fn toggle_included(&mut self) -> bool {
        self.included = !self.included;
        self.included
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Attach route position and distance-to-route to one candidate.
pub fn project_candidate(track: &Track, candidate: Candidate) -> Place {
    let line = track.line();
    let point = candidate.point();
    let position = line.project(&point);
    let nearest = line.interpolate(position);
    let distance_km = round_to(haversine_km(&point, &nearest), 3);

    Place {
        name: candidate.display_name(),
        latitude: candidate.latitude,
        longitude: candidate.longitude,
        category: candidate.category,
        distance_km,
        position,
        included: true,
    }
}

/// Project every candidate. No filtering happens here; output order follows input.
pub fn project_candidates(track: &Track, candidates: Vec<Candidate>) -> Vec<Place> {
    candidates
        .into_iter()
        .map(|c| project_candidate(track, c))
        .collect()
}

/// Stable sort into route order.
pub fn sort_by_position(places: &mut [Place]) {
    places.sort_by(|a, b| a.position.total_cmp(&b.position));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn east_west_track() -> Track {
        Track::new(vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 0.5),
            GpsPoint::new(0.0, 1.0),
        ])
        .unwrap()
    }

    #[test]
    fn test_project_candidate() {
        let track = east_west_track();
        let c = Candidate::new(0.01, 0.25, Category::Fuel, Some("Shell".into()));
        let place = project_candidate(&track, c);

        assert_eq!(place.name, "Shell");
        assert!((place.position - 0.25).abs() < 1e-9);
        // 0.01 deg ~ 1.112 km, rounded to 3 decimals
        assert!((place.distance_km - 1.112).abs() < 0.002);
        assert_eq!(place.distance_km, round_to(place.distance_km, 3));
        assert!(place.included);
    }

    #[test]
    fn test_unnamed_candidate_gets_placeholder() {
        let track = east_west_track();
        let c = Candidate::new(0.0, 0.5, Category::Repair, None);
        assert_eq!(project_candidate(&track, c).name, "Unnamed Repair Shop");
    }

    #[test]
    fn test_sort_by_position_is_stable() {
        let track = east_west_track();
        let mut places = project_candidates(
            &track,
            vec![
                Candidate::new(0.0, 0.9, Category::Fuel, Some("C".into())),
                Candidate::new(0.001, 0.1, Category::Fuel, Some("A".into())),
                Candidate::new(-0.001, 0.1, Category::Fuel, Some("B".into())),
            ],
        );
        sort_by_position(&mut places);
        let names: Vec<_> = places.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_toggle_included() {
        let track = east_west_track();
        let mut place = project_candidate(&track, Candidate::new(0.0, 0.5, Category::Cafe, None));
        assert!(!place.toggle_included());
        assert!(place.toggle_included());
        place.set_included(false);
        assert!(!place.included);
    }

    #[test]
    fn test_place_key_hashing() {
        let mut keys = HashSet::new();
        keys.insert(PlaceKey::new(45.0, 6.0));
        assert!(keys.contains(&PlaceKey::new(45.0, 6.0)));
        assert!(!keys.contains(&PlaceKey::new(45.0, 6.000001)));
    }
}
