//! Gap analysis along the route.
//!
//! Given the places of one category (typically fuel), report how far you
//! travel along the track from the start to the first place, between each
//! consecutive pair, and from the last place to the end.

use crate::projector::round_to;
use crate::{Place, Track};

/// Label used for the start of the route.
pub const ROUTE_START: &str = "ROUTE START";
/// Label used for the end of the route.
pub const ROUTE_END: &str = "ROUTE END";

/// Distance along the route between two consecutive stops.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct GapRecord {
    pub from: String,
    pub to: String,
    /// Distance along the track in km, 2 decimals
    pub distance_km: f64,
    pub from_position: f64,
    pub to_position: f64,
}

impl GapRecord {
    fn new(track: &Track, from: &str, to: &str, from_position: f64, to_position: f64) -> Self {
        let distance = track.line().route_distance_km(from_position, to_position);
        Self {
            from: from.to_string(),
            to: to.to_string(),
            distance_km: round_to(distance, 2),
            from_position,
            to_position,
        }
    }
}

/// Compute gap records for `places`.
///
/// Places are sorted by position first (stable). An empty input gives an
/// empty result; `n` places give `n + 1` records.
pub fn analyze_gaps(track: &Track, places: &[Place]) -> Vec<GapRecord> {
    if places.is_empty() {
        return Vec::new();
    }

    let mut ordered: Vec<&Place> = places.iter().collect();
    ordered.sort_by(|a, b| a.position.total_cmp(&b.position));

    let mut records = Vec::with_capacity(ordered.len() + 1);

    let first = ordered[0];
    records.push(GapRecord::new(track, ROUTE_START, &first.name, 0.0, first.position));

    for pair in ordered.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        records.push(GapRecord::new(track, &prev.name, &curr.name, prev.position, curr.position));
    }

    let last = ordered[ordered.len() - 1];
    let route_length = track.line().length();
    records.push(GapRecord::new(track, &last.name, ROUTE_END, last.position, route_length));

    records
}

/// The record with the largest distance, if any.
pub fn longest_gap(records: &[GapRecord]) -> Option<&GapRecord> {
    records
        .iter()
        .max_by(|a, b| a.distance_km.total_cmp(&b.distance_km))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::project_candidates;
    use crate::{Candidate, Category, GpsPoint};

    fn equator_track() -> Track {
        Track::new((0..=10).map(|i| GpsPoint::new(0.0, i as f64 * 0.1)).collect()).unwrap()
    }

    fn fuel_at(track: &Track, lons: &[f64]) -> Vec<Place> {
        let candidates = lons
            .iter()
            .enumerate()
            .map(|(i, &lon)| Candidate::new(0.0005, lon, Category::Fuel, Some(format!("F{i}"))))
            .collect();
        project_candidates(track, candidates)
    }

    #[test]
    fn test_empty_places_give_no_records() {
        assert!(analyze_gaps(&equator_track(), &[]).is_empty());
    }

    #[test]
    fn test_single_place_splits_route() {
        let track = equator_track();
        let places = fuel_at(&track, &[0.33]);
        let records = analyze_gaps(&track, &places);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].from, ROUTE_START);
        assert_eq!(records[0].to, "F0");
        assert_eq!(records[1].from, "F0");
        assert_eq!(records[1].to, ROUTE_END);

        let sum = records[0].distance_km + records[1].distance_km;
        assert!((sum - track.length_km()).abs() < 0.02, "sum {sum} vs {}", track.length_km());
    }

    #[test]
    fn test_records_follow_route_order() {
        let track = equator_track();
        let places = fuel_at(&track, &[0.8, 0.2, 0.5]);
        let records = analyze_gaps(&track, &places);

        let pairs: Vec<(&str, &str)> = records
            .iter()
            .map(|r| (r.from.as_str(), r.to.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(ROUTE_START, "F1"), ("F1", "F2"), ("F2", "F0"), ("F0", ROUTE_END)]
        );

        // 0.1 deg of longitude on the equator ~ 11.12 km
        let expected = [22.24, 33.36, 33.36, 22.24];
        for (record, want) in records.iter().zip(expected) {
            assert!((record.distance_km - want).abs() < 0.05, "{record:?}");
        }
    }

    #[test]
    fn test_same_position_gives_zero_gap() {
        let track = equator_track();
        let places = fuel_at(&track, &[0.5, 0.5]);
        let records = analyze_gaps(&track, &places);
        assert_eq!(records[1].distance_km, 0.0);
    }

    #[test]
    fn test_longest_gap() {
        let track = equator_track();
        let records = analyze_gaps(&track, &fuel_at(&track, &[0.1, 0.9]));
        let longest = longest_gap(&records).unwrap();
        assert_eq!((longest.from.as_str(), longest.to.as_str()), ("F0", "F1"));
        assert!(longest_gap(&[]).is_none());
    }
}
