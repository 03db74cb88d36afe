//! Route segmentation.
//!
//! A long track cannot be sent to the search index as one bounding box: the
//! response would be too large and the query would time out. The track is cut
//! into chunks of bounded geodesic length, each searched on its own.
//!
//! Consecutive segments share their boundary point so their buffers overlap
//! and no stretch of road is left uncovered.

use crate::geo_utils::{haversine_km, polyline_length_km, RouteLine, SegmentBuffer};
use crate::GpsPoint;

/// Default chunk length in kilometers.
pub const DEFAULT_CHUNK_KM: f64 = 50.0;

/// A contiguous piece of the track.
#[derive(Debug, Clone)]
pub struct RouteSegment {
    /// Position of this segment in the segment list
    pub index: usize,
    points: Vec<GpsPoint>,
    line: RouteLine,
}

impl RouteSegment {
    fn new(index: usize, points: Vec<GpsPoint>) -> Option<Self> {
        let line = RouteLine::new(&points)?;
        Some(Self { index, points, line })
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    /// Indexed polyline for distance-to-segment checks.
    pub fn line(&self) -> &RouteLine {
        &self.line
    }

    pub fn length_km(&self) -> f64 {
        polyline_length_km(&self.points)
    }

    /// Buffer polygon around this segment.
    pub fn buffer(&self, radius_deg: f64) -> SegmentBuffer {
        SegmentBuffer::new(&self.points, radius_deg)
    }
}

/// Split `points` into segments of at most `chunk_km` geodesic length.
///
/// A segment only exceeds `chunk_km` when it is a single edge that is longer
/// than `chunk_km` on its own. Segments with fewer than two points are never
/// produced, so fewer than two input points yields no segments.
pub fn split_by_distance(points: &[GpsPoint], chunk_km: f64) -> Vec<RouteSegment> {
    let mut segments = Vec::new();
    let Some(first) = points.first() else {
        return segments;
    };

    let mut current = vec![*first];
    let mut accumulated = 0.0;

    for pair in points.windows(2) {
        let step = haversine_km(&pair[0], &pair[1]);

        if accumulated + step > chunk_km && current.len() > 1 {
            let index = segments.len();
            let finished = std::mem::replace(&mut current, vec![pair[0]]);
            segments.extend(RouteSegment::new(index, finished));
            accumulated = 0.0;
        }

        current.push(pair[1]);
        accumulated += step;
    }

    if current.len() > 1 {
        let index = segments.len();
        segments.extend(RouteSegment::new(index, current));
    }

    segments
}
