//! # Geographic Utilities
//!
//! Core geographic computation utilities for relating places to a GPS track.
//!
//! ## Overview
//!
//! | Function / Type | Description |
//! |-----------------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points (meters) |
//! | [`haversine_km`] | Same, in kilometers |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//! | [`km_to_buffer_degrees`] | Convert a km radius to the degree radius used for buffers |
//! | [`RouteLine`] | Indexed polyline: `project`, `interpolate`, distances along it |
//! | [`SegmentBuffer`] | Buffer polygon around a polyline with point containment |
//!
//! ## Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees).
//! Internally `geo` coordinates use `x = longitude`, `y = latitude`.
//!
//! ## Route positions
//!
//! [`RouteLine::project`] returns an arc-length position measured in the
//! polyline's own units (planar degrees). Positions are only meaningful for
//! ordering and for feeding back into [`RouteLine::interpolate`]. Anything
//! reported in kilometers is obtained by summing haversine distances between
//! real points, never by scaling a position.

use geo::{BoundingRect, Contains, Coord, Distance, Haversine, LineString, MultiPolygon, Point, Polygon};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::{Bounds, GpsPoint};

/// Kilometers per degree used to turn search radii into buffer radii.
///
/// Applied uniformly to latitude and longitude, so buffers get narrower in
/// real terms (east-west) as latitude grows.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Vertices used for each half-circle cap of a buffer capsule.
const CAP_STEPS: usize = 16;

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface.
///
/// # Example
///
/// ```rust
/// use route_places::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Great-circle distance in kilometers.
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    haversine_distance(p1, p2) / 1000.0
}

/// Calculate the total length of a polyline (GPS track) in meters.
///
/// Sums the haversine distance between consecutive points. Empty or single-point
/// tracks return 0.0.
pub fn polyline_length(points: &[GpsPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

/// Total polyline length in kilometers.
#[inline]
pub fn polyline_length_km(points: &[GpsPoint]) -> f64 {
    polyline_length(points) / 1000.0
}

/// Convert a search radius in kilometers to the degree radius used for buffers.
///
/// Uses the flat [`KM_PER_DEGREE`] constant, regardless of latitude.
///
/// ```rust
/// use route_places::geo_utils::km_to_buffer_degrees;
///
/// assert!((km_to_buffer_degrees(111.0) - 1.0).abs() < 1e-12);
/// ```
#[inline]
pub fn km_to_buffer_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// For empty input, returns a bounds with MIN/MAX values that contain nothing.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Planar helpers
// =============================================================================

#[inline]
fn to_coord(p: &GpsPoint) -> Coord {
    Coord { x: p.longitude, y: p.latitude }
}

#[inline]
fn to_gps(c: Coord) -> GpsPoint {
    GpsPoint::new(c.y, c.x)
}

#[inline]
fn planar_distance(a: Coord, b: Coord) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Closest point on the edge `start -> end` to `p`, with its edge parameter in `[0, 1]`.
fn closest_on_edge(start: Coord, end: Coord, p: Coord) -> (Coord, f64) {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return (start, 0.0);
    }
    let t = (((p.x - start.x) * dx + (p.y - start.y) * dy) / len2).clamp(0.0, 1.0);
    (Coord { x: start.x + t * dx, y: start.y + t * dy }, t)
}

// =============================================================================
// RouteLine
// =============================================================================

/// One edge of a [`RouteLine`], stored in the R-tree.
#[derive(Debug, Clone, Copy)]
struct TrackEdge {
    start: Coord,
    end: Coord,
    /// Arc-length position of `start` along the whole line
    start_position: f64,
}

impl TrackEdge {
    fn length(&self) -> f64 {
        planar_distance(self.start, self.end)
    }
}

impl RTreeObject for TrackEdge {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.start.x.min(self.end.x), self.start.y.min(self.end.y)],
            [self.start.x.max(self.end.x), self.start.y.max(self.end.y)],
        )
    }
}

impl PointDistance for TrackEdge {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let p = Coord { x: point[0], y: point[1] };
        let (closest, _) = closest_on_edge(self.start, self.end, p);
        let d = planar_distance(p, closest);
        d * d
    }
}

/// A polyline indexed for projection queries.
///
/// Built once per track (or per segment); all queries are read-only.
#[derive(Debug, Clone)]
pub struct RouteLine {
    coords: Vec<Coord>,
    /// Arc-length position of every vertex; `cumulative[0] == 0`
    cumulative: Vec<f64>,
    tree: RTree<TrackEdge>,
}

impl RouteLine {
    /// Build a route line from GPS points. Returns `None` for fewer than 2 points.
    pub fn new(points: &[GpsPoint]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }

        let coords: Vec<Coord> = points.iter().map(to_coord).collect();
        let cumulative: Vec<f64> = std::iter::once(0.0)
            .chain(coords.windows(2).scan(0.0, |acc, w| {
                *acc += planar_distance(w[0], w[1]);
                Some(*acc)
            }))
            .collect();

        let edges: Vec<TrackEdge> = coords
            .windows(2)
            .zip(cumulative.iter())
            .map(|(w, &start_position)| TrackEdge {
                start: w[0],
                end: w[1],
                start_position,
            })
            .collect();

        Some(Self {
            coords,
            cumulative,
            tree: RTree::bulk_load(edges),
        })
    }

    /// Total arc length in line units (degrees).
    pub fn length(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Total geodesic length in kilometers.
    pub fn length_km(&self) -> f64 {
        self.coords
            .windows(2)
            .map(|w| haversine_km(&to_gps(w[0]), &to_gps(w[1])))
            .sum()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Always false: a route line has at least two vertices.
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Arc-length position of the point on the line closest to `point`.
    ///
    /// When two edges are equally close either may be picked; only the relative
    /// order of positions matters downstream.
    pub fn project(&self, point: &GpsPoint) -> f64 {
        let p = to_coord(point);
        match self.tree.nearest_neighbor(&[p.x, p.y]) {
            Some(edge) => {
                let (_, t) = closest_on_edge(edge.start, edge.end, p);
                edge.start_position + t * edge.length()
            }
            None => 0.0,
        }
    }

    /// Point on the line at arc-length `position`, clamped to `[0, length]`.
    pub fn interpolate(&self, position: f64) -> GpsPoint {
        let pos = position.clamp(0.0, self.length());
        let upper = self.cumulative.partition_point(|&c| c <= pos);
        let i = upper.saturating_sub(1).min(self.coords.len() - 2);

        let edge_len = self.cumulative[i + 1] - self.cumulative[i];
        let t = if edge_len > 0.0 {
            ((pos - self.cumulative[i]) / edge_len).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let a = self.coords[i];
        let b = self.coords[i + 1];
        to_gps(Coord {
            x: a.x + t * (b.x - a.x),
            y: a.y + t * (b.y - a.y),
        })
    }

    /// Closest point on the line to `point` (`interpolate(project(point))`).
    pub fn nearest_point(&self, point: &GpsPoint) -> GpsPoint {
        self.interpolate(self.project(point))
    }

    /// Geodesic distance in km from `point` to its nearest point on the line.
    pub fn perpendicular_distance_km(&self, point: &GpsPoint) -> f64 {
        haversine_km(point, &self.nearest_point(point))
    }

    /// Geodesic distance in km travelled along the line between two positions.
    ///
    /// Sums the haversine legs of the polyline formed by `interpolate(from)`,
    /// every vertex whose position lies in `[from, to]`, and `interpolate(to)`.
    /// Returns 0 when `from >= to`.
    pub fn route_distance_km(&self, from: f64, to: f64) -> f64 {
        if from >= to {
            return 0.0;
        }

        let mut points = Vec::with_capacity(self.coords.len() + 2);
        points.push(self.interpolate(from));
        for (coord, &pos) in self.coords.iter().zip(self.cumulative.iter()) {
            if pos >= from && pos <= to {
                points.push(to_gps(*coord));
            }
        }
        points.push(self.interpolate(to));

        polyline_length_km(&points)
    }

    /// Index of the vertex geodesically closest to `point`.
    pub fn closest_vertex_index(&self, point: &GpsPoint) -> usize {
        self.coords
            .iter()
            .enumerate()
            .map(|(i, c)| (i, haversine_distance(&to_gps(*c), point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(0, |(i, _)| i)
    }
}

/// Arc-length position of `point` projected onto `line`.
#[inline]
pub fn project(point: &GpsPoint, line: &RouteLine) -> f64 {
    line.project(point)
}

/// Point on `line` at arc-length `position`.
#[inline]
pub fn interpolate(line: &RouteLine, position: f64) -> GpsPoint {
    line.interpolate(position)
}

/// Geodesic distance in km from `point` to `line`.
#[inline]
pub fn perpendicular_distance_km(point: &GpsPoint, line: &RouteLine) -> f64 {
    line.perpendicular_distance_km(point)
}

// =============================================================================
// Buffers
// =============================================================================

/// Buffer polygon of a polyline: one round-capped capsule per edge.
///
/// The union of the capsules is the buffer; a point is inside the buffer when
/// any capsule contains it.
#[derive(Debug, Clone)]
pub struct SegmentBuffer {
    polygons: MultiPolygon<f64>,
}

impl SegmentBuffer {
    /// Buffer `points` by `radius_deg` degrees.
    pub fn new(points: &[GpsPoint], radius_deg: f64) -> Self {
        let coords: Vec<Coord> = points.iter().map(to_coord).collect();
        let polygons = match coords.len() {
            0 => Vec::new(),
            1 => vec![capsule(coords[0], coords[0], radius_deg)],
            _ => coords
                .windows(2)
                .map(|w| capsule(w[0], w[1], radius_deg))
                .collect(),
        };
        Self { polygons: MultiPolygon::new(polygons) }
    }

    /// Point-in-polygon test against the buffer.
    pub fn contains(&self, point: &GpsPoint) -> bool {
        let p = Point::from(to_coord(point));
        self.polygons.0.iter().any(|poly| poly.contains(&p))
    }

    /// Bounding box of the buffer polygon, used as the search query box.
    pub fn bounds(&self) -> Option<Bounds> {
        self.polygons.bounding_rect().map(|rect| Bounds {
            min_lat: rect.min().y,
            max_lat: rect.max().y,
            min_lng: rect.min().x,
            max_lng: rect.max().x,
        })
    }
}

/// Round-capped capsule around `a -> b`. A zero-length edge yields a circle.
fn capsule(a: Coord, b: Coord, radius: f64) -> Polygon<f64> {
    use std::f64::consts::{FRAC_PI_2, PI};

    let heading = if a == b { 0.0 } else { (b.y - a.y).atan2(b.x - a.x) };
    let mut ring = Vec::with_capacity(2 * (CAP_STEPS + 1));

    // Cap around `b` sweeps the forward half, cap around `a` the backward half.
    for (center, from) in [(b, heading - FRAC_PI_2), (a, heading + FRAC_PI_2)] {
        for step in 0..=CAP_STEPS {
            let angle = from + PI * step as f64 / CAP_STEPS as f64;
            ring.push(Coord {
                x: center.x + radius * angle.cos(),
                y: center.y + radius * angle.sin(),
            });
        }
    }

    Polygon::new(LineString::new(ring), vec![])
}

/// True if `point` lies within `buffer_deg` of the polyline `segment`.
pub fn buffer_contains(segment: &[GpsPoint], buffer_deg: f64, point: &GpsPoint) -> bool {
    SegmentBuffer::new(segment, buffer_deg).contains(point)
}

// =============================================================================
// Unit Tests
// =============================================================================
