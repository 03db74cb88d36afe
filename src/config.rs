//! Run configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::DEFAULT_MIN_ROUTE_KM;
use crate::search::DEFAULT_QUERY_TIMEOUT_SECS;
use crate::segmenter::DEFAULT_CHUNK_KM;
use crate::{Category, FinderError, RetryPolicy, SearchProfile};

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org";

/// Configuration for a place-finding run.
///
/// Every field has a default, so a JSON config file only needs the fields
/// it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinderConfig {
    /// Maximum geodesic length of a search segment (km).
    /// Default: 50.0
    pub chunk_km: f64,

    /// Concurrent place searches.
    /// Default: 2
    pub max_concurrency: usize,

    pub overpass_url: String,
    pub osrm_url: String,

    /// HTTP timeout for place searches, also sent as the Overpass query timeout.
    /// Default: 60
    pub search_timeout_secs: u64,

    /// HTTP timeout for road routing.
    /// Default: 10
    pub routing_timeout_secs: u64,

    /// Default: 3
    pub search_retries: u32,

    /// Default: 1
    pub routing_retries: u32,

    /// Base of the exponential backoff.
    /// Default: 1000
    pub base_delay_ms: u64,

    /// Delay before every first place-search attempt.
    /// Default: 500
    pub pre_call_delay_ms: u64,

    /// Compute road routes to off-track places.
    /// Default: true
    pub road_routes: bool,

    /// Places closer than this get no road route (km).
    /// Default: 0.2
    pub road_route_min_km: f64,

    /// What to search for. Default: fuel only.
    pub profiles: Vec<SearchProfile>,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            chunk_km: DEFAULT_CHUNK_KM,
            max_concurrency: 2,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            search_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            routing_timeout_secs: 10,
            search_retries: 3,
            routing_retries: 1,
            base_delay_ms: 1000,
            pre_call_delay_ms: 500,
            road_routes: true,
            road_route_min_km: DEFAULT_MIN_ROUTE_KM,
            profiles: vec![SearchProfile::with_default(Category::Fuel)],
        }
    }
}

impl FinderConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &Path) -> Result<Self, FinderError> {
        let text = std::fs::read_to_string(path).map_err(|source| FinderError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: FinderConfig = serde_json::from_str(&text)
            .map_err(|e| FinderError::InvalidConfig(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FinderError> {
        if !(self.chunk_km.is_finite() && self.chunk_km > 0.0) {
            return Err(FinderError::InvalidConfig(format!(
                "chunk_km must be positive, got {}",
                self.chunk_km
            )));
        }
        if self.max_concurrency == 0 {
            return Err(FinderError::InvalidConfig("max_concurrency must be at least 1".into()));
        }
        if !(self.road_route_min_km.is_finite() && self.road_route_min_km >= 0.0) {
            return Err(FinderError::InvalidConfig(format!(
                "road_route_min_km must be non-negative, got {}",
                self.road_route_min_km
            )));
        }
        if self.profiles.is_empty() {
            return Err(FinderError::InvalidConfig("select at least one category".into()));
        }
        Ok(())
    }

    /// Replace the profile for `profile.category()`, or add it.
    pub fn set_profile(&mut self, profile: SearchProfile) {
        match self.profiles.iter_mut().find(|p| p.category() == profile.category()) {
            Some(existing) => *existing = profile,
            None => self.profiles.push(profile),
        }
    }

    pub fn search_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.search_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            pre_call_delay: Duration::from_millis(self.pre_call_delay_ms),
            rate_limit_tier: true,
        }
    }

    pub fn routing_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.routing_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            pre_call_delay: Duration::ZERO,
            rate_limit_tier: false,
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }

    pub fn routing_timeout(&self) -> Duration {
        Duration::from_secs(self.routing_timeout_secs)
    }
}
