//! Candidate deduplication.
//!
//! The same shop is often mapped twice (a node for the shop and one for the
//! forecourt, or two mappers) and segment buffers overlap at their
//! boundaries. Two candidates of the same category are merged when they are
//! close and their names agree:
//!
//! | Distance | Name rule |
//! |----------|-----------|
//! | ≤ 50 m   | [`names_similar`]: equal after dropping filler words, or one contains the other (shorter ≥ 4 chars) |
//! | ≤ 200 m  | [`names_very_similar`]: equal, or one contains the other (both ≥ 4 chars) |
//!
//! Candidates without a name are never merged. The first candidate in input
//! order survives.

use crate::geo_utils::haversine_distance;
use crate::Candidate;

/// Merge radius for loosely matching names, in meters.
pub const NEAR_THRESHOLD_M: f64 = 50.0;
/// Merge radius for strictly matching names, in meters.
pub const FAR_THRESHOLD_M: f64 = 200.0;

/// Words that do not help tell two places apart.
const STOPWORDS: [&str; 10] = [
    "the", "de", "la", "le", "du", "des", "station", "service", "gas", "petrol",
];

const MIN_CONTAINED_LEN: usize = 4;

/// Remove near-duplicate candidates, keeping the first of each group.
///
/// O(n²) in the number of candidates; runs see a few hundred at most.
pub fn dedup(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        if !kept.iter().any(|existing| is_duplicate(existing, &candidate)) {
            kept.push(candidate);
        }
    }

    kept
}

/// True when `a` and `b` describe the same place.
pub fn is_duplicate(a: &Candidate, b: &Candidate) -> bool {
    if a.category != b.category {
        return false;
    }
    let (Some(name_a), Some(name_b)) = (a.name.as_deref(), b.name.as_deref()) else {
        return false;
    };

    let distance_m = haversine_distance(&a.point(), &b.point());
    if distance_m <= NEAR_THRESHOLD_M {
        return names_similar(name_a, name_b);
    }
    if distance_m <= FAR_THRESHOLD_M {
        return names_very_similar(name_a, name_b);
    }
    false
}

fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| !STOPWORDS.contains(w))
        .collect();

    if words.is_empty() {
        lowered
    } else {
        words.join(" ")
    }
}

fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

/// Loose name match used for candidates within [`NEAR_THRESHOLD_M`].
pub fn names_similar(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a == b {
        return true;
    }
    let shorter = a.chars().count().min(b.chars().count());
    shorter >= MIN_CONTAINED_LEN && contains_either(&a, &b)
}

/// Strict name match used for candidates within [`FAR_THRESHOLD_M`].
pub fn names_very_similar(a: &str, b: &str) -> bool {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return true;
    }
    a.chars().count() >= MIN_CONTAINED_LEN
        && b.chars().count() >= MIN_CONTAINED_LEN
        && contains_either(&a, &b)
}
