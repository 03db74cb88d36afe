//! Overpass place search for one (segment, category) pair.
//!
//! The query box is the bounding rectangle of the segment buffer. Results are
//! then filtered against the buffer polygon itself, or, for categories that
//! must sit on the road ([`crate::Category::on_route_only`]), against the distance to
//! the segment line.

use std::collections::HashMap;
use std::future::Future;

use log::{debug, info};
use serde::Deserialize;

use crate::retry::{with_retry, FetchError, RetryPolicy, Sleeper};
use crate::{ApiStats, Bounds, CancelFlag, Candidate, GpsPoint, RouteSegment, SearchProfile};

/// Server-side query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 60;

/// Top-level Overpass JSON response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<OverpassElement>,
}

/// One node (or way, via its center) returned by Overpass.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OverpassElement {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub center: Option<OverpassCenter>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct OverpassCenter {
    pub lat: f64,
    pub lon: f64,
}

impl OverpassElement {
    /// Node coordinates, falling back to the element center.
    pub fn coordinates(&self) -> Option<GpsPoint> {
        match (self.lat, self.lon, self.center) {
            (Some(lat), Some(lon), _) => Some(GpsPoint::new(lat, lon)),
            (_, _, Some(c)) => Some(GpsPoint::new(c.lat, c.lon)),
            _ => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.tags
            .get("name")
            .map(String::as_str)
            .filter(|n| !n.trim().is_empty())
    }
}

/// Sends an Overpass QL query and decodes the response.
pub trait SearchTransport: Send + Sync {
    fn query(&self, query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send;
}

/// Build the Overpass QL query for `filter` inside `bounds`.
pub fn build_query(filter: &str, bounds: &Bounds, timeout_secs: u64) -> String {
    format!(
        "[out:json][timeout:{}];{}({},{},{},{});out center;",
        timeout_secs, filter, bounds.min_lat, bounds.min_lng, bounds.max_lat, bounds.max_lng
    )
}

/// Candidates found for one call plus its failure statistics.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub candidates: Vec<Candidate>,
    pub stats: ApiStats,
}

/// Place search with retries.
pub struct PlaceSearchClient<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
    query_timeout_secs: u64,
}

impl<T: SearchTransport, S: Sleeper> PlaceSearchClient<T, S> {
    pub fn new(transport: T, sleeper: S) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::search(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_query_timeout(mut self, secs: u64) -> Self {
        self.query_timeout_secs = secs;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Search one segment for one category.
    ///
    /// Never fails: after retries are exhausted the call yields no
    /// candidates and reports the failure in its stats.
    pub async fn search(
        &self,
        segment: &RouteSegment,
        profile: &SearchProfile,
        cancel: &CancelFlag,
    ) -> SearchOutcome {
        let category = profile.category();
        let buffer = segment.buffer(profile.buffer_degrees());
        let Some(bounds) = buffer.bounds() else {
            return SearchOutcome::default();
        };

        let query = build_query(category.filter(), &bounds, self.query_timeout_secs);
        let label = format!("Overpass {} #{}", category.key(), segment.index);
        debug!("[{label}] {query}");

        let attempted = with_retry(&self.policy, &self.sleeper, cancel, &label, || {
            self.transport.query(&query)
        })
        .await;

        let Some(response) = attempted.value else {
            return SearchOutcome { candidates: Vec::new(), stats: attempted.stats };
        };

        let total = response.elements.len();
        let candidates: Vec<Candidate> = response
            .elements
            .into_iter()
            .filter_map(|element| {
                let point = element.coordinates()?;
                let keep = if category.on_route_only() {
                    segment.line().perpendicular_distance_km(&point) <= profile.max_distance_km()
                } else {
                    buffer.contains(&point)
                };
                keep.then(|| {
                    let name = element.name().map(str::to_string);
                    Candidate::new(point.latitude, point.longitude, category, name)
                })
            })
            .collect();

        info!(
            "[{label}] {} of {} elements within {} km",
            candidates.len(),
            total,
            profile.max_distance_km()
        );

        SearchOutcome { candidates, stats: attempted.stats }
    }
}
