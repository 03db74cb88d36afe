//! Integration tests for the Overpass and OSRM HTTP transports.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use route_places::http::{OsrmHttp, OverpassHttp};
use route_places::retry::{FetchError, RecordingSleeper};
use route_places::routing::{RoadRouter, RoutingTransport};
use route_places::search::{PlaceSearchClient, SearchTransport};
use route_places::{
    split_by_distance, ApiStats, CancelFlag, Category, GpsPoint, SearchProfile,
};

fn overpass(server: &MockServer) -> OverpassHttp {
    OverpassHttp::new(format!("{}/api/interpreter", server.uri()), Duration::from_secs(5))
        .expect("failed to build Overpass transport")
}

fn osrm(server: &MockServer) -> OsrmHttp {
    OsrmHttp::new(server.uri(), Duration::from_secs(5)).expect("failed to build OSRM transport")
}

fn fuel_elements() -> serde_json::Value {
    json!({
        "version": 0.6,
        "elements": [
            {"type": "node", "id": 1, "lat": 0.001, "lon": 0.02, "tags": {"amenity": "fuel", "name": "Shell"}},
            {"type": "node", "id": 2, "lat": 0.5, "lon": 0.02, "tags": {"amenity": "fuel", "name": "Too far"}}
        ]
    })
}

// ---------------------------------------------------------------------------
// Overpass
// ---------------------------------------------------------------------------

#[tokio::test]
async fn overpass_posts_query_as_form_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/interpreter"))
        .and(body_string_contains("data="))
        .respond_with(ResponseTemplate::new(200).set_body_json(fuel_elements()))
        .expect(1)
        .mount(&server)
        .await;

    let response = overpass(&server)
        .query(r#"[out:json][timeout:60];node["amenity"="fuel"](0,0,1,1);out center;"#)
        .await
        .expect("query should succeed");

    assert_eq!(response.elements.len(), 2);
    assert_eq!(response.elements[0].name(), Some("Shell"));
}

#[tokio::test]
async fn overpass_status_codes_are_classified() {
    for (status, expected) in [
        (429, FetchError::Status(429)),
        (504, FetchError::Status(504)),
        (400, FetchError::Status(400)),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;

        let err = overpass(&server).query("q").await.unwrap_err();
        assert_eq!(err, expected);
    }
}

#[tokio::test]
async fn overpass_invalid_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>busy</html>"))
        .mount(&server)
        .await;

    let err = overpass(&server).query("q").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)), "got {err:?}");
    assert!(err.retry_cause().is_none());
}

#[tokio::test]
async fn slow_server_is_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(fuel_elements())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let transport = OverpassHttp::new(
        format!("{}/api/interpreter", server.uri()),
        Duration::from_millis(100),
    )
    .unwrap();
    let err = transport.query("q").await.unwrap_err();
    assert_eq!(err, FetchError::Timeout);
}

#[tokio::test]
async fn search_client_recovers_from_rate_limiting() {
    let server = MockServer::start().await;

    // First registered mock wins until it is used up
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fuel_elements()))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let client = PlaceSearchClient::new(overpass(&server), sleeper.clone());
    let points: Vec<GpsPoint> = (0..=5).map(|i| GpsPoint::new(0.0, i as f64 * 0.01)).collect();
    let segment = split_by_distance(&points, 50.0).remove(0);

    let outcome = client
        .search(&segment, &SearchProfile::with_default(Category::Fuel), &CancelFlag::new())
        .await;

    let names: Vec<_> = outcome.candidates.iter().filter_map(|c| c.name.as_deref()).collect();
    assert_eq!(names, vec!["Shell"]);
    assert_eq!(outcome.stats, ApiStats { failures: 1, resolved: 1 });
    assert_eq!(
        sleeper.delays(),
        [0.5, 4.0, 8.0, 16.0].map(Duration::from_secs_f64).to_vec()
    );
}

// ---------------------------------------------------------------------------
// OSRM
// ---------------------------------------------------------------------------

#[tokio::test]
async fn osrm_requests_full_geojson_route() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/route/v1/driving/6.1,45.1;6.2,45.2"))
        .and(query_param("overview", "full"))
        .and(query_param("geometries", "geojson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "Ok",
            "routes": [{
                "geometry": {"type": "LineString", "coordinates": [[6.1, 45.1], [6.15, 45.12], [6.2, 45.2]]},
                "distance": 12000.0,
                "duration": 900.0
            }],
            "waypoints": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let router = RoadRouter::new(osrm(&server), RecordingSleeper::new());
    let (route, stats) = router
        .route(GpsPoint::new(45.1, 6.1), GpsPoint::new(45.2, 6.2), &CancelFlag::new())
        .await;

    let route = route.expect("route should be parsed");
    assert_eq!(route.points.len(), 3);
    assert_eq!(route.points[1], GpsPoint::new(45.12, 6.15));
    assert_eq!(route.distance_km, Some(12.0));
    assert_eq!(stats, ApiStats::default());
}

#[tokio::test]
async fn osrm_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let router = RoadRouter::new(osrm(&server), RecordingSleeper::new());
    let (route, stats) = router
        .route(GpsPoint::new(45.1, 6.1), GpsPoint::new(45.2, 6.2), &CancelFlag::new())
        .await;

    assert!(route.is_none());
    assert_eq!(stats, ApiStats { failures: 1, resolved: 0 });
}

#[tokio::test]
async fn osrm_no_route_is_not_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": "NoRoute", "routes": []})))
        .mount(&server)
        .await;

    let response = osrm(&server)
        .route(GpsPoint::new(45.1, 6.1), GpsPoint::new(45.2, 6.2))
        .await
        .expect("request should succeed");
    assert_eq!(response.code.as_deref(), Some("NoRoute"));
    assert!(response.routes.is_empty());
}
