//! reqwest transports for the place search and routing services.
//!
//! Each request goes through three phases, timed at debug level:
//! - send and receive headers (status check)
//! - download the body
//! - JSON decode
//!
//! Failures are classified into [`FetchError`]; retrying is left to
//! [`crate::retry::with_retry`].

use std::future::Future;
use std::time::{Duration, Instant};

use log::debug;
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::retry::FetchError;
use crate::routing::{OsrmResponse, RoutingTransport};
use crate::search::{OverpassResponse, SearchTransport};
use crate::{FinderError, GpsPoint};

const USER_AGENT: &str = concat!("route-places/", env!("CARGO_PKG_VERSION"));

/// Build a pooled client with the given request timeout.
pub fn build_client(timeout: Duration) -> Result<Client, FinderError> {
    let client = Client::builder()
        .user_agent(USER_AGENT)
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(60))
        .tcp_keepalive(Duration::from_secs(30))
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Map a transport-level reqwest error onto the retry classification.
///
/// HTTP statuses never reach here: `decode_json` checks them on the
/// response and reports [`FetchError::Status`] itself.
pub fn classify(err: &reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else if err.is_connect() {
        FetchError::Connect(err.to_string())
    } else if err.is_decode() || err.is_body() {
        FetchError::Decode(err.to_string())
    } else {
        FetchError::Other(err.to_string())
    }
}

/// Check the status, download and decode a JSON response.
async fn decode_json<T: DeserializeOwned>(
    label: &str,
    request: reqwest::RequestBuilder,
) -> Result<T, FetchError> {
    let req_start = Instant::now();

    // Phase 1: send request, receive headers
    let resp = request.send().await.map_err(|e| classify(&e))?;
    let headers_elapsed = req_start.elapsed();

    let status = resp.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    // Phase 2: body
    let body_start = Instant::now();
    let bytes = resp.bytes().await.map_err(|e| classify(&e))?;
    let body_elapsed = body_start.elapsed();

    // Phase 3: JSON
    let json_start = Instant::now();
    let data = serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;

    debug!(
        "[{}] headers={:?} body={:?}({:.1}KB) json={:?} total={:?}",
        label,
        headers_elapsed,
        body_elapsed,
        bytes.len() as f64 / 1024.0,
        json_start.elapsed(),
        req_start.elapsed()
    );

    Ok(data)
}

/// Overpass API over HTTP: POSTs the query as form field `data`.
#[derive(Debug, Clone)]
pub struct OverpassHttp {
    client: Client,
    url: String,
}

impl OverpassHttp {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, FinderError> {
        Ok(Self::with_client(build_client(timeout)?, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

impl SearchTransport for OverpassHttp {
    fn query(&self, query: &str) -> impl Future<Output = Result<OverpassResponse, FetchError>> + Send {
        let request = self.client.post(&self.url).form(&[("data", query)]);
        decode_json("Overpass", request)
    }
}

/// OSRM over HTTP: GET `/route/v1/driving/{lon},{lat};{lon},{lat}`.
#[derive(Debug, Clone)]
pub struct OsrmHttp {
    client: Client,
    base_url: String,
}

impl OsrmHttp {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FinderError> {
        Ok(Self::with_client(build_client(timeout)?, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self { client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub fn route_url(&self, from: GpsPoint, to: GpsPoint) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, from.longitude, from.latitude, to.longitude, to.latitude
        )
    }
}

impl RoutingTransport for OsrmHttp {
    fn route(
        &self,
        from: GpsPoint,
        to: GpsPoint,
    ) -> impl Future<Output = Result<OsrmResponse, FetchError>> + Send {
        let request = self.client.get(self.route_url(from, to));
        decode_json("OSRM", request)
    }
}
