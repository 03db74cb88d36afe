//! Run orchestration.
//!
//! A run goes through these phases, checking the cancel flag between each:
//!
//! 1. Split the track into segments
//! 2. For each category, search every segment (bounded concurrency)
//! 3. Drop exact repeats, then near-duplicates
//! 4. Project the survivors onto the track and sort them by position
//! 5. Fuel gap analysis
//! 6. Optional road routes to off-track places
//!
//! Progress is reported as [`RunEvent`]s over a channel; the results come
//! back once, in the final [`RunReport`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::gaps::longest_gap;
use crate::http::{OsrmHttp, OverpassHttp};
use crate::projector::{project_candidate, sort_by_position};
use crate::retry::{Sleeper, TokioSleeper};
use crate::routing::{enrich_road_routes, RoadRoute, RoadRouter, RoutingTransport};
use crate::search::{PlaceSearchClient, SearchOutcome, SearchTransport};
use crate::{
    analyze_gaps, dedup, split_by_distance, ApiHealth, CancelFlag, Candidate, Category, FinderConfig,
    FinderError, GapRecord, Place, PlaceKey, RouteSegment, SearchProfile, Track,
};

/// Progress notifications sent while a run is in flight.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        route_km: f64,
        segments: usize,
    },
    SearchStarted {
        category: Category,
        max_distance_km: f64,
    },
    SegmentSearched {
        category: Category,
        segment: usize,
        found: usize,
        completed: usize,
        total: usize,
    },
    Deduplicated {
        before: usize,
        after: usize,
    },
    PlacesResolved {
        category: Category,
        count: usize,
    },
    RoadRoutesStarted {
        places: usize,
    },
    RoadRoutesFinished {
        routes: usize,
    },
}

/// How a run ended.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Stopped by the user. No places are published.
    Cancelled,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Cancelled => None,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub route_length_km: f64,
    pub segment_count: usize,
    /// Places per category, each list in route order
    pub places: BTreeMap<Category, Vec<Place>>,
    #[serde(skip)]
    pub road_routes: HashMap<PlaceKey, RoadRoute>,
    pub fuel_gaps: Vec<GapRecord>,
    pub health: ApiHealth,
}

impl RunReport {
    pub fn places_for(&self, category: Category) -> &[Place] {
        self.places.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// All places, by category then route position.
    pub fn all_places(&self) -> impl Iterator<Item = &Place> {
        self.places.values().flatten()
    }

    /// Places that will be written to the output.
    pub fn included_places(&self) -> Vec<&Place> {
        self.all_places().filter(|p| p.included).collect()
    }

    pub fn place_count(&self) -> usize {
        self.places.values().map(Vec::len).sum()
    }

    fn find_mut(&mut self, category: Category, key: PlaceKey) -> Option<&mut Place> {
        self.places
            .get_mut(&category)?
            .iter_mut()
            .find(|p| p.key() == key)
    }

    /// Set the inclusion flag of one place. Returns false if no such place exists.
    pub fn set_included(&mut self, category: Category, key: PlaceKey, included: bool) -> bool {
        match self.find_mut(category, key) {
            Some(place) => {
                place.set_included(included);
                true
            }
            None => false,
        }
    }

    /// Flip the inclusion flag of one place and return the new value.
    pub fn toggle_place(&mut self, category: Category, key: PlaceKey) -> Option<bool> {
        self.find_mut(category, key).map(Place::toggle_included)
    }

    pub fn longest_fuel_gap(&self) -> Option<&GapRecord> {
        longest_gap(&self.fuel_gaps)
    }
}

/// Runs searches, deduplication, projection and enrichment for one track.
pub struct PlaceFinder<S, R, D> {
    config: FinderConfig,
    search: PlaceSearchClient<S, D>,
    router: RoadRouter<R, D>,
}

impl PlaceFinder<OverpassHttp, OsrmHttp, TokioSleeper> {
    /// Finder talking to the configured Overpass and OSRM servers.
    pub fn from_config(config: FinderConfig) -> Result<Self, FinderError> {
        config.validate()?;
        let overpass = OverpassHttp::new(config.overpass_url.clone(), config.search_timeout())?;
        let osrm = OsrmHttp::new(config.osrm_url.clone(), config.routing_timeout())?;
        Ok(Self::new(config, overpass, osrm, TokioSleeper))
    }
}

impl<S, R, D> PlaceFinder<S, R, D>
where
    S: SearchTransport,
    R: RoutingTransport,
    D: Sleeper + Clone,
{
    pub fn new(config: FinderConfig, search: S, routing: R, sleeper: D) -> Self {
        let search = PlaceSearchClient::new(search, sleeper.clone())
            .with_policy(config.search_policy())
            .with_query_timeout(config.search_timeout_secs);
        let router = RoadRouter::new(routing, sleeper).with_policy(config.routing_policy());
        Self { config, search, router }
    }

    pub fn config(&self) -> &FinderConfig {
        &self.config
    }

    /// Execute a full run.
    pub async fn run(
        &self,
        track: &Track,
        cancel: &CancelFlag,
        events: &UnboundedSender<RunEvent>,
    ) -> RunOutcome {
        let start = Instant::now();
        let emit = |event: RunEvent| {
            // Receiver may be gone; the run still completes
            let _ = events.send(event);
        };

        let route_km = track.length_km();
        let segments = split_by_distance(track.points(), self.config.chunk_km);
        info!(
            "[PlaceFinder] Route {:.2} km in {} segments, {} categories",
            route_km,
            segments.len(),
            self.config.profiles.len()
        );
        emit(RunEvent::Started { route_km, segments: segments.len() });

        let mut health = ApiHealth::default();
        let mut pool: Vec<Candidate> = Vec::new();
        let mut seen: HashSet<(PlaceKey, Category)> = HashSet::new();

        for profile in &self.config.profiles {
            if cancel.is_cancelled() {
                return cancelled();
            }

            let category = profile.category();
            emit(RunEvent::SearchStarted { category, max_distance_km: profile.max_distance_km() });

            let mut outcomes = self.search_segments(&segments, profile, cancel, &emit).await;
            if cancel.is_cancelled() {
                return cancelled();
            }

            // Completion order is arbitrary; merge in route order
            outcomes.sort_by_key(|(index, _)| *index);

            let before = pool.len();
            for (_, outcome) in outcomes {
                health.search.merge(outcome.stats);
                for candidate in outcome.candidates {
                    if seen.insert(candidate.key()) {
                        pool.push(candidate);
                    }
                }
            }
            info!(
                "[PlaceFinder] Collected {} {} candidates",
                pool.len() - before,
                category.key()
            );
        }

        let before = pool.len();
        let unique = dedup(pool);
        info!(
            "[PlaceFinder] After deduplication: {} places (removed {} duplicates)",
            unique.len(),
            before - unique.len()
        );
        emit(RunEvent::Deduplicated { before, after: unique.len() });

        let mut places: BTreeMap<Category, Vec<Place>> = self
            .config
            .profiles
            .iter()
            .map(|p| (p.category(), Vec::new()))
            .collect();

        for candidate in unique {
            if cancel.is_cancelled() {
                return cancelled();
            }
            let place = project_candidate(track, candidate);
            places.entry(place.category).or_default().push(place);
        }

        for (category, list) in places.iter_mut() {
            sort_by_position(list);
            emit(RunEvent::PlacesResolved { category: *category, count: list.len() });
        }

        let fuel_gaps = places
            .get(&Category::Fuel)
            .map(|fuel| analyze_gaps(track, fuel))
            .unwrap_or_default();

        let mut road_routes = HashMap::new();
        if self.config.road_routes {
            let all: Vec<Place> = places.values().flatten().cloned().collect();
            let wanted = all
                .iter()
                .filter(|p| p.distance_km >= self.config.road_route_min_km)
                .count();
            emit(RunEvent::RoadRoutesStarted { places: wanted });

            let enriched = enrich_road_routes(
                &self.router,
                track,
                &all,
                self.config.road_route_min_km,
                cancel,
            )
            .await;
            health.routing.merge(enriched.stats);
            road_routes = enriched.routes;
            emit(RunEvent::RoadRoutesFinished { routes: road_routes.len() });
        }

        if cancel.is_cancelled() {
            return cancelled();
        }

        if health.needs_warning() {
            warn!(
                "[PlaceFinder] {} unresolved API failures, results may be incomplete",
                health.net_unresolved()
            );
        }

        let report = RunReport {
            route_length_km: route_km,
            segment_count: segments.len(),
            places,
            road_routes,
            fuel_gaps,
            health,
        };
        info!(
            "[PlaceFinder] DONE: {} places, {} road routes in {:.2}s",
            report.place_count(),
            report.road_routes.len(),
            start.elapsed().as_secs_f64()
        );
        RunOutcome::Completed(report)
    }

    /// Search all segments for one profile through a bounded pool.
    async fn search_segments(
        &self,
        segments: &[RouteSegment],
        profile: &SearchProfile,
        cancel: &CancelFlag,
        emit: &(impl Fn(RunEvent) + Sync),
    ) -> Vec<(usize, SearchOutcome)> {
        let total = segments.len();
        let category = profile.category();

        let mut results = Vec::with_capacity(total);
        let mut in_flight = stream::iter(0..total)
            .map(|index| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                let outcome = self.search.search(&segments[index], profile, cancel).await;
                Some((index, outcome))
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some(result) = in_flight.next().await {
            let Some((index, outcome)) = result else {
                continue;
            };
            let completed = results.len() + 1;
            debug!(
                "[PlaceFinder] [{completed}/{total}] {} segment {} found {}",
                category.key(),
                index,
                outcome.candidates.len()
            );
            emit(RunEvent::SegmentSearched {
                category,
                segment: index,
                found: outcome.candidates.len(),
                completed,
                total,
            });
            results.push((index, outcome));
        }

        results
    }
}

fn cancelled() -> RunOutcome {
    info!("[PlaceFinder] Processing cancelled by user");
    RunOutcome::Cancelled
}

/// A run executing on a background task.
pub struct RunHandle {
    events: UnboundedReceiver<RunEvent>,
    cancel: CancelFlag,
    task: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Next progress event; `None` once the run has finished.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    /// Ask the run to stop. In-flight requests finish but their results are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for the run to end. A panicked run becomes [`FinderError::Unexpected`].
    pub async fn wait(self) -> Result<RunOutcome, FinderError> {
        self.task.await.map_err(|e| {
            warn!("[PlaceFinder] Run task failed: {e}");
            FinderError::Unexpected(e.to_string())
        })
    }
}

/// Start `finder` on `track` in the background.
///
/// Must be called from within a tokio runtime.
pub fn spawn_run<S, R, D>(finder: PlaceFinder<S, R, D>, track: Track) -> RunHandle
where
    S: SearchTransport + 'static,
    R: RoutingTransport + 'static,
    D: Sleeper + Clone + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = CancelFlag::new();
    let run_cancel = cancel.clone();

    let task = tokio::spawn(async move { finder.run(&track, &run_cancel, &tx).await });

    RunHandle { events: rx, cancel, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo_utils::KM_PER_DEGREE;
    use crate::retry::{FetchError, RecordingSleeper};
    use crate::routing::OsrmResponse;
    use crate::search::{OverpassElement, OverpassResponse};
    use crate::GpsPoint;
    use std::future::Future;
    use std::sync::{Arc, Mutex};

    /// Answers every query with the same elements.
    #[derive(Default)]
    struct FixedSearch {
        elements: Vec<OverpassElement>,
        queries: Mutex<Vec<String>>,
    }

    impl SearchTransport for Arc<FixedSearch> {
        fn query(&self, query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send {
            self.queries.lock().unwrap().push(query.to_string());
            std::future::ready(Ok(OverpassResponse { elements: self.elements.clone() }))
        }
    }

    struct FailingSearch;

    impl SearchTransport for FailingSearch {
        fn query(&self, _query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send {
            std::future::ready(Err(FetchError::Status(429)))
        }
    }

    struct PanickingSearch;

    fn explode() -> Result<OverpassResponse, FetchError> {
        panic!("transport exploded")
    }

    impl SearchTransport for PanickingSearch {
        fn query(&self, _query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send {
            async { explode() }
        }
    }

    #[derive(Default)]
    struct NoRoutes {
        requests: Mutex<usize>,
    }

    impl RoutingTransport for Arc<NoRoutes> {
        fn route(
            &self,
            _from: GpsPoint,
            _to: GpsPoint,
        ) -> impl Future<Output = Result<OsrmResponse, FetchError>> + Send {
            *self.requests.lock().unwrap() += 1;
            std::future::ready(Ok(OsrmResponse::default()))
        }
    }

    /// Cancels the run on its first query, then answers normally.
    struct CancellingSearch {
        cancel: CancelFlag,
        inner: Arc<FixedSearch>,
    }

    impl SearchTransport for CancellingSearch {
        fn query(&self, query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send {
            self.cancel.cancel();
            self.inner.query(query)
        }
    }

    /// Cancels the run on its first route request.
    struct CancellingRoutes {
        cancel: CancelFlag,
        inner: Arc<NoRoutes>,
    }

    impl RoutingTransport for CancellingRoutes {
        fn route(
            &self,
            from: GpsPoint,
            to: GpsPoint,
        ) -> impl Future<Output = Result<OsrmResponse, FetchError>> + Send {
            self.cancel.cancel();
            self.inner.route(from, to)
        }
    }

    fn fuel(lat: f64, lon: f64, name: &str) -> OverpassElement {
        OverpassElement {
            lat: Some(lat),
            lon: Some(lon),
            tags: [("name".to_string(), name.to_string())].into(),
            ..Default::default()
        }
    }

    /// 100 km along the equator in 10 points.
    fn hundred_km_track() -> (Track, f64) {
        let km_per_deg = crate::geo_utils::haversine_km(&GpsPoint::new(0.0, 0.0), &GpsPoint::new(0.0, 1.0));
        let length_deg = 100.0 / km_per_deg;
        let points = (0..10)
            .map(|i| GpsPoint::new(0.0, length_deg * i as f64 / 9.0))
            .collect();
        (Track::new(points).unwrap(), km_per_deg)
    }

    fn config() -> FinderConfig {
        FinderConfig { road_routes: false, ..Default::default() }
    }

    #[tokio::test]
    async fn test_end_to_end_fuel_gaps() {
        let (track, km_per_deg) = hundred_km_track();
        let at_km = |km: f64| km / km_per_deg;
        let search = Arc::new(FixedSearch {
            elements: vec![
                fuel(0.0005, at_km(50.0), "Middle"),
                fuel(-0.0005, at_km(10.0), "First"),
                fuel(0.0005, at_km(90.0), "Last"),
            ],
            ..Default::default()
        });
        let finder = PlaceFinder::new(
            config(),
            search.clone(),
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &CancelFlag::new(), &tx).await;
        let report = outcome.report().expect("run completed");

        assert!(report.segment_count >= 2);
        assert_eq!(search.queries.lock().unwrap().len(), report.segment_count);

        // Each station appears once even though segment buffers overlap
        let names: Vec<&str> = report.places_for(Category::Fuel).iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Middle", "Last"]);

        let gaps: Vec<f64> = report.fuel_gaps.iter().map(|g| g.distance_km).collect();
        let expected = [10.0, 40.0, 40.0, 10.0];
        assert_eq!(gaps.len(), 4);
        for (got, want) in gaps.iter().zip(expected) {
            assert!((got - want).abs() < 0.1, "gaps {gaps:?}");
        }
        assert!((report.route_length_km - 100.0).abs() < 0.01);
        assert_eq!(report.health, ApiHealth::default());

        assert!(matches!(rx.recv().await, Some(RunEvent::Started { .. })));
    }

    #[tokio::test]
    async fn test_road_routes_only_for_distant_places() {
        let (track, km_per_deg) = hundred_km_track();
        // ~1.1 km off the track
        let off = 1.0 / KM_PER_DEGREE;
        let search = Arc::new(FixedSearch {
            elements: vec![fuel(off, 20.0 / km_per_deg, "Village"), fuel(0.0, 60.0 / km_per_deg, "Roadside")],
            ..Default::default()
        });
        let routing = Arc::new(NoRoutes::default());
        let finder = PlaceFinder::new(
            FinderConfig::default(),
            search,
            routing.clone(),
            Arc::new(RecordingSleeper::new()),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &CancelFlag::new(), &tx).await;
        let report = outcome.report().unwrap();

        assert_eq!(*routing.requests.lock().unwrap(), 1);
        // Empty OSRM answer means no route, not a failure
        assert!(report.road_routes.is_empty());
        assert_eq!(report.health.routing.failures, 0);
    }

    #[tokio::test]
    async fn test_failed_searches_are_counted() {
        let (track, _) = hundred_km_track();
        let sleeper = Arc::new(RecordingSleeper::new());
        let mut config = config();
        config.profiles = vec![
            SearchProfile::with_default(Category::Fuel),
            SearchProfile::with_default(Category::Bakery),
        ];
        let finder = PlaceFinder::new(config, FailingSearch, Arc::new(NoRoutes::default()), sleeper.clone());
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &CancelFlag::new(), &tx).await;
        let report = outcome.report().unwrap();

        let calls = 2 * report.segment_count as u32;
        assert_eq!(report.health.search.failures, calls);
        assert_eq!(report.health.search.resolved, 0);
        assert!(report.health.needs_warning());
        assert_eq!(report.place_count(), 0);
        assert!(report.fuel_gaps.is_empty());
        // 0.5 s courtesy delay plus three rate-limit backoffs per call
        assert_eq!(sleeper.delays().len(), 4 * calls as usize);
    }

    #[tokio::test]
    async fn test_cancelled_run_publishes_nothing() {
        let (track, _) = hundred_km_track();
        let search = Arc::new(FixedSearch::default());
        let finder = PlaceFinder::new(
            config(),
            search.clone(),
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );
        let cancel = CancelFlag::new();
        cancel.cancel();
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &cancel, &tx).await;
        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert!(search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_search_stops_dispatch() {
        let (track, km_per_deg) = hundred_km_track();
        let cancel = CancelFlag::new();
        let inner = Arc::new(FixedSearch {
            elements: vec![fuel(0.0, 30.0 / km_per_deg, "Total")],
            ..Default::default()
        });
        let search = CancellingSearch { cancel: cancel.clone(), inner: inner.clone() };
        let mut config = config();
        config.chunk_km = 5.0;
        config.max_concurrency = 1;
        config.profiles = vec![
            SearchProfile::with_default(Category::Fuel),
            SearchProfile::with_default(Category::Bakery),
        ];
        let finder = PlaceFinder::new(
            config,
            search,
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &cancel, &tx).await;
        drop(tx);

        assert!(matches!(outcome, RunOutcome::Cancelled));
        // The in-flight query finishes, nothing after it is sent
        assert_eq!(inner.queries.lock().unwrap().len(), 1);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(!events.iter().any(|e| matches!(
            e,
            RunEvent::Deduplicated { .. } | RunEvent::PlacesResolved { .. }
        )));
    }

    #[tokio::test]
    async fn test_cancel_during_road_routes_stops_lookups() {
        let (track, km_per_deg) = hundred_km_track();
        // ~1.1 km off the track, both need a road route
        let off = 1.0 / KM_PER_DEGREE;
        let search = Arc::new(FixedSearch {
            elements: vec![
                fuel(off, 20.0 / km_per_deg, "Village"),
                fuel(-off, 60.0 / km_per_deg, "Hamlet"),
            ],
            ..Default::default()
        });
        let cancel = CancelFlag::new();
        let routes = Arc::new(NoRoutes::default());
        let routing = CancellingRoutes { cancel: cancel.clone(), inner: routes.clone() };
        let finder = PlaceFinder::new(
            FinderConfig::default(),
            search,
            routing,
            Arc::new(RecordingSleeper::new()),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let outcome = finder.run(&track, &cancel, &tx).await;

        assert!(matches!(outcome, RunOutcome::Cancelled));
        assert_eq!(*routes.requests.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_spawned_run_streams_events() {
        let (track, km_per_deg) = hundred_km_track();
        let search = Arc::new(FixedSearch {
            elements: vec![fuel(0.0, 30.0 / km_per_deg, "Total")],
            ..Default::default()
        });
        let finder = PlaceFinder::new(
            config(),
            search,
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );

        let mut handle = spawn_run(finder, track);
        let mut events = Vec::new();
        while let Some(event) = handle.next_event().await {
            events.push(event);
        }
        let outcome = handle.wait().await.unwrap();

        assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
        assert!(events.contains(&RunEvent::PlacesResolved { category: Category::Fuel, count: 1 }));
        let searched = events
            .iter()
            .filter(|e| matches!(e, RunEvent::SegmentSearched { .. }))
            .count();
        assert_eq!(searched, outcome.report().unwrap().segment_count);
    }

    #[tokio::test]
    async fn test_panicking_run_is_unexpected_error() {
        let (track, _) = hundred_km_track();
        let finder = PlaceFinder::new(
            config(),
            PanickingSearch,
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );

        let handle = spawn_run(finder, track);
        let err = handle.wait().await.unwrap_err();
        assert!(matches!(err, FinderError::Unexpected(_)));
    }

    #[tokio::test]
    async fn test_toggle_inclusion() {
        let (track, km_per_deg) = hundred_km_track();
        let search = Arc::new(FixedSearch {
            elements: vec![fuel(0.0, 30.0 / km_per_deg, "A"), fuel(0.0, 70.0 / km_per_deg, "B")],
            ..Default::default()
        });
        let finder = PlaceFinder::new(
            config(),
            search,
            Arc::new(NoRoutes::default()),
            Arc::new(RecordingSleeper::new()),
        );
        let (tx, _rx) = mpsc::unbounded_channel();

        let RunOutcome::Completed(mut report) = finder.run(&track, &CancelFlag::new(), &tx).await else {
            panic!("run was cancelled");
        };
        let key = report.places_for(Category::Fuel)[0].key();

        assert_eq!(report.toggle_place(Category::Fuel, key), Some(false));
        assert_eq!(report.included_places().len(), 1);
        assert!(report.set_included(Category::Fuel, key, true));
        assert_eq!(report.included_places().len(), 2);
        assert_eq!(report.toggle_place(Category::Bakery, key), None);
    }
}
