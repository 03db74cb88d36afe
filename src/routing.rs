//! Road routes from the track to off-route places (OSRM).
//!
//! A place a few kilometers off the track is only useful if you know how to
//! get there. For every place at least [`DEFAULT_MIN_ROUTE_KM`] away, ask the
//! routing service for a driving path from the nearest point of the track to
//! the place.

use std::collections::HashMap;
use std::future::Future;

use log::{debug, info};
use serde::Deserialize;

use crate::retry::{with_retry, FetchError, RetryPolicy, Sleeper};
use crate::{ApiStats, CancelFlag, GpsPoint, Place, PlaceKey, Track};

/// Places closer to the track than this get no road route.
pub const DEFAULT_MIN_ROUTE_KM: f64 = 0.2;

/// OSRM `/route` response, reduced to what we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OsrmResponse {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OsrmRoute {
    pub geometry: Option<OsrmGeometry>,
    /// Meters
    #[serde(default)]
    pub distance: Option<f64>,
    /// Seconds
    #[serde(default)]
    pub duration: Option<f64>,
}

/// GeoJSON LineString geometry, `[lon, lat]` pairs.
#[derive(Debug, Clone, Deserialize)]
pub struct OsrmGeometry {
    #[serde(default)]
    pub coordinates: Vec<[f64; 2]>,
}

/// Driving path from a point on the track to a place.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RoadRoute {
    /// At least two points, track end first
    pub points: Vec<GpsPoint>,
    pub distance_km: Option<f64>,
    pub duration_s: Option<f64>,
}

impl RoadRoute {
    /// First route of `response` with a usable geometry.
    pub fn from_response(response: OsrmResponse) -> Option<Self> {
        let route = response.routes.into_iter().next()?;
        let points: Vec<GpsPoint> = route
            .geometry?
            .coordinates
            .into_iter()
            .map(|[lon, lat]| GpsPoint::new(lat, lon))
            .collect();

        if points.len() < 2 {
            return None;
        }
        Some(Self {
            points,
            distance_km: route.distance.map(|m| m / 1000.0),
            duration_s: route.duration,
        })
    }

    pub fn start(&self) -> Option<GpsPoint> {
        self.points.first().copied()
    }
}

/// Requests a driving route between two points.
pub trait RoutingTransport: Send + Sync {
    fn route(
        &self,
        from: GpsPoint,
        to: GpsPoint,
    ) -> impl Future<Output = Result<OsrmResponse, FetchError>> + Send;
}

/// Routing client with the routing retry policy.
pub struct RoadRouter<T, S> {
    transport: T,
    sleeper: S,
    policy: RetryPolicy,
}

impl<T: RoutingTransport, S: Sleeper> RoadRouter<T, S> {
    pub fn new(transport: T, sleeper: S) -> Self {
        Self { transport, sleeper, policy: RetryPolicy::routing() }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Route from `from` to `to`. `None` when the service failed or found no route.
    pub async fn route(
        &self,
        from: GpsPoint,
        to: GpsPoint,
        cancel: &CancelFlag,
    ) -> (Option<RoadRoute>, ApiStats) {
        let label = format!("OSRM {:.4},{:.4}", to.latitude, to.longitude);
        debug!(
            "[{label}] Requesting road route from ({:.4}, {:.4})",
            from.latitude, from.longitude
        );

        let attempted = with_retry(&self.policy, &self.sleeper, cancel, &label, || {
            self.transport.route(from, to)
        })
        .await;

        let route = attempted.value.and_then(|response| {
            let route = RoadRoute::from_response(response);
            if route.is_none() {
                debug!("[{label}] No usable route in response");
            }
            route
        });
        (route, attempted.stats)
    }
}

/// Road routes keyed by place, with the routing statistics.
#[derive(Debug, Clone, Default)]
pub struct RoadRoutes {
    pub routes: HashMap<PlaceKey, RoadRoute>,
    pub stats: ApiStats,
}

/// Compute road routes for every place at least `min_km` off the track.
///
/// Places are handled one at a time. Failed lookups are skipped; the run
/// continues without a route for that place.
pub async fn enrich_road_routes<T, S>(
    router: &RoadRouter<T, S>,
    track: &Track,
    places: &[Place],
    min_km: f64,
    cancel: &CancelFlag,
) -> RoadRoutes
where
    T: RoutingTransport,
    S: Sleeper,
{
    let mut result = RoadRoutes::default();
    let wanted: Vec<&Place> = places.iter().filter(|p| p.distance_km >= min_km).collect();
    if wanted.is_empty() {
        return result;
    }

    info!("[RoadRoutes] Calculating road routes for {} places", wanted.len());

    for place in wanted {
        if cancel.is_cancelled() {
            break;
        }
        if result.routes.contains_key(&place.key()) {
            continue;
        }

        let target = place.point();
        let from = track.line().nearest_point(&target);
        let (route, stats) = router.route(from, target, cancel).await;
        result.stats.merge(stats);

        if let Some(route) = route {
            result.routes.insert(place.key(), route);
        }
    }

    info!("[RoadRoutes] {} road routes calculated", result.routes.len());
    result
}
