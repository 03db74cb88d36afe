//! # Route Places
//!
//! Find fuel, food, lodging and hazards near a GPS track and relate them back
//! to the route.
//!
//! This library provides:
//! - Route segmentation into bounded-length chunks for area-limited searches
//! - Overpass place search with retry, backoff and rate-limit handling
//! - Similarity-based deduplication of search candidates
//! - Projection of places onto the track (distance off-route, position along it)
//! - Fuel gap analysis along the route
//! - Optional road routes (OSRM) from the track to each place
//!
//! ## Features
//!
//! - **`http`** - Overpass/OSRM clients and run orchestration (default)
//! - **`gpx`** - GPX track input and waypoint/track output (default)
//! - **`cli`** - The `route-places` command line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use route_places::{Candidate, Category, GpsPoint, Track, dedup, projector, gaps};
//!
//! let track = Track::new(vec![
//!     GpsPoint::new(45.00, 6.00),
//!     GpsPoint::new(45.00, 6.50),
//!     GpsPoint::new(45.00, 7.00),
//! ]).unwrap();
//!
//! let candidates = vec![
//!     Candidate::new(45.01, 6.20, Category::Fuel, Some("Total".into())),
//!     Candidate::new(45.01, 6.20, Category::Fuel, Some("Total".into())),
//!     Candidate::new(44.99, 6.80, Category::Fuel, None),
//! ];
//!
//! let unique = dedup::dedup(candidates);
//! assert_eq!(unique.len(), 2);
//!
//! let mut places = projector::project_candidates(&track, unique);
//! projector::sort_by_position(&mut places);
//!
//! let records = gaps::analyze_gaps(&track, &places);
//! assert_eq!(records.len(), 3);
//! ```

pub mod cancel;
pub mod category;
pub mod dedup;
pub mod error;
pub mod gaps;
pub mod geo_utils;
pub mod projector;
pub mod retry;
pub mod segmenter;

pub use cancel::CancelFlag;
pub use category::{Category, SearchProfile};
pub use dedup::dedup;
pub use error::FinderError;
pub use gaps::{analyze_gaps, GapRecord};
pub use geo_utils::RouteLine;
pub use projector::{Place, PlaceKey};
pub use retry::{ApiHealth, ApiStats, RetryCause, RetryPolicy};
pub use segmenter::{split_by_distance, RouteSegment};

// Place search, road routing and run orchestration
#[cfg(feature = "http")]
pub mod config;
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub mod pipeline;
#[cfg(feature = "http")]
pub mod routing;
#[cfg(feature = "http")]
pub mod search;

#[cfg(feature = "http")]
pub use config::FinderConfig;
#[cfg(feature = "http")]
pub use pipeline::{spawn_run, PlaceFinder, RunEvent, RunHandle, RunOutcome, RunReport};

// GPX input/output
#[cfg(feature = "gpx")]
pub mod gpx_io;

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use route_places::GpsPoint;
/// let point = GpsPoint::new(51.5074, -0.1278); // London
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "http", derive(serde::Serialize, serde::Deserialize))]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from GPS points.
    pub fn from_points(points: &[GpsPoint]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        Some(geo_utils::compute_bounds(points))
    }
}

/// The route being searched along.
///
/// Points are kept in traversal order and never change once loaded.
#[derive(Debug, Clone)]
pub struct Track {
    points: Vec<GpsPoint>,
    line: RouteLine,
}

impl Track {
    /// Build a track from its points in traversal order.
    ///
    /// Fails with [`FinderError::InvalidPoint`] on the first point with
    /// non-finite or out-of-range coordinates, and with
    /// [`FinderError::NoTrackPoints`] when there are fewer than two points.
    pub fn new(points: Vec<GpsPoint>) -> Result<Self, FinderError> {
        if let Some((index, p)) = points.iter().enumerate().find(|(_, p)| !p.is_valid()) {
            return Err(FinderError::InvalidPoint {
                index,
                latitude: p.latitude,
                longitude: p.longitude,
            });
        }
        let line = RouteLine::new(&points).ok_or(FinderError::NoTrackPoints)?;
        Ok(Self { points, line })
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    /// The indexed polyline used for projection.
    pub fn line(&self) -> &RouteLine {
        &self.line
    }

    /// Total geodesic length in kilometers.
    pub fn length_km(&self) -> f64 {
        geo_utils::polyline_length_km(&self.points)
    }

    pub fn bounds(&self) -> Bounds {
        geo_utils::compute_bounds(&self.points)
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// A raw search result, before deduplication and projection.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub latitude: f64,
    pub longitude: f64,
    pub category: Category,
    /// Name tag from the search index, if any
    pub name: Option<String>,
}

impl Candidate {
    pub fn new(latitude: f64, longitude: f64, category: Category, name: Option<String>) -> Self {
        Self { latitude, longitude, category, name }
    }

    pub fn point(&self) -> GpsPoint {
        GpsPoint::new(self.latitude, self.longitude)
    }

    /// Name for display, falling back to `"Unnamed <Category>"`.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("Unnamed {}", self.category.display_name()),
        }
    }

    /// Natural key: exact coordinates plus category.
    pub fn key(&self) -> (PlaceKey, Category) {
        (PlaceKey::new(self.latitude, self.longitude), self.category)
    }
}
