//! Retry discipline for the external services.
//!
//! Every request goes through [`with_retry`], a bounded loop that classifies
//! each failure, picks a delay from the [`RetryPolicy`] and sleeps through an
//! injected [`Sleeper`]. Statistics come back with the result instead of
//! being accumulated in shared counters; the run aggregates them into an
//! [`ApiHealth`].
//!
//! # Backoff schedule (base delay 1 s)
//!
//! | Retry | Plain failure | HTTP 429 (rate-limit tier) |
//! |-------|---------------|----------------------------|
//! | 1     | 2 s           | 4 s                        |
//! | 2     | 4 s           | 8 s                        |
//! | 3     | 8 s           | 16 s                       |

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, warn};
use thiserror::Error;

use crate::CancelFlag;

/// Why a request failed, as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("connection error: {0}")]
    Connect(String),

    #[error("timeout")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    /// Body could not be read or decoded
    #[error("invalid response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Other(String),
}

/// Retry classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCause {
    /// Connection problems, timeouts, HTTP 504
    Transient,
    /// HTTP 429
    RateLimited,
}

impl FetchError {
    /// `None` means the failure is permanent and must not be retried.
    ///
    /// Undecodable bodies (HTML error pages, truncated JSON) are permanent,
    /// unlike connection failures and timeouts. A client that retries every
    /// request-layer failure alike would retry them too.
    pub fn retry_cause(&self) -> Option<RetryCause> {
        match self {
            FetchError::Status(429) => Some(RetryCause::RateLimited),
            FetchError::Status(504) => Some(RetryCause::Transient),
            FetchError::Status(_) | FetchError::Decode(_) => None,
            FetchError::Connect(_) | FetchError::Timeout | FetchError::Other(_) => {
                Some(RetryCause::Transient)
            }
        }
    }
}

/// How many times to retry and how long to wait.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base of the exponential schedule
    pub base_delay: Duration,
    /// Courtesy delay before every first attempt
    pub pre_call_delay: Duration,
    /// Back off one extra doubling on HTTP 429
    pub rate_limit_tier: bool,
}

impl RetryPolicy {
    /// Place search: 3 retries, 0.5 s courtesy delay, steeper 429 backoff.
    pub fn search() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            pre_call_delay: Duration::from_millis(500),
            rate_limit_tier: true,
        }
    }

    /// Road routing: a single retry on the plain schedule.
    pub fn routing() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_secs(1),
            pre_call_delay: Duration::ZERO,
            rate_limit_tier: false,
        }
    }

    /// Delay before retry number `retry` (1-based) after a failure of kind `cause`.
    pub fn delay_for(&self, retry: u32, cause: RetryCause) -> Duration {
        let exponent = match cause {
            RetryCause::RateLimited if self.rate_limit_tier => retry + 1,
            _ => retry,
        };
        self.base_delay.saturating_mul(1u32 << exponent.min(30))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::search()
    }
}

/// Injected delay function.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

impl<S: Sleeper> Sleeper for std::sync::Arc<S> {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Sleeps on the tokio timer.
#[cfg(feature = "http")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[cfg(feature = "http")]
impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Returns immediately and remembers every requested delay.
///
/// Used to exercise backoff schedules without waiting.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    /// All delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(duration);
        }
        std::future::ready(())
    }
}

/// Failure statistics for one service.
///
/// `failures` counts calls that hit at least one failed attempt; `resolved`
/// counts those among them that eventually succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct ApiStats {
    pub failures: u32,
    pub resolved: u32,
}

impl ApiStats {
    /// Calls that failed and never recovered.
    pub fn net_unresolved(&self) -> u32 {
        self.failures.saturating_sub(self.resolved)
    }

    pub fn merge(&mut self, other: ApiStats) {
        self.failures += other.failures;
        self.resolved += other.resolved;
    }
}

/// Aggregated statistics for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "http", derive(serde::Serialize))]
pub struct ApiHealth {
    /// Place search (Overpass)
    pub search: ApiStats,
    /// Road routing (OSRM)
    pub routing: ApiStats,
}

impl ApiHealth {
    /// Net unresolved failures that trigger a warning overall.
    pub const TOTAL_WARNING_THRESHOLD: u32 = 5;
    /// Net unresolved search failures that trigger a warning on their own.
    pub const SEARCH_WARNING_THRESHOLD: u32 = 3;

    pub fn total_failures(&self) -> u32 {
        self.search.failures + self.routing.failures
    }

    pub fn total_resolved(&self) -> u32 {
        self.search.resolved + self.routing.resolved
    }

    pub fn net_unresolved(&self) -> u32 {
        self.search.net_unresolved() + self.routing.net_unresolved()
    }

    /// True when enough failures remain unresolved that results are likely incomplete.
    pub fn needs_warning(&self) -> bool {
        self.net_unresolved() >= Self::TOTAL_WARNING_THRESHOLD
            || self.search.net_unresolved() >= Self::SEARCH_WARNING_THRESHOLD
    }

    /// Human-readable summary; empty when nothing went wrong.
    pub fn summary(&self) -> Vec<String> {
        if self.total_failures() == 0 {
            return Vec::new();
        }

        let mut lines = vec![
            "API Status Summary:".to_string(),
            format!("  Place search failures: {}", self.search.failures),
            format!("  Road routing failures: {}", self.routing.failures),
        ];
        if self.total_resolved() > 0 {
            lines.push(format!(
                "  Recovered by retries: {} ({} search, {} routing)",
                self.total_resolved(),
                self.search.resolved,
                self.routing.resolved
            ));
        }

        let net = self.net_unresolved();
        if net > 0 {
            lines.push(format!("  Net unresolved failures: {net}"));
        } else {
            lines.push("  All API failures were resolved by retries".to_string());
        }

        if self.needs_warning() {
            lines.push(format!(
                "Warning: {net} unresolved API failures; places or road routes may be missing. \
                 Check your connection, try again later, or reduce search distances."
            ));
        }
        lines
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub struct Attempted<T> {
    /// `None` when every attempt failed, a permanent error occurred, or the run was cancelled
    pub value: Option<T>,
    pub stats: ApiStats,
    /// Attempts actually made
    pub attempts: u32,
}

/// Run `operation` under `policy`.
///
/// The first attempt is preceded by the policy's courtesy delay. Retries stop
/// early when `cancel` is set or the failure is permanent.
pub async fn with_retry<T, F, Fut, S>(
    policy: &RetryPolicy,
    sleeper: &S,
    cancel: &CancelFlag,
    label: &str,
    mut operation: F,
) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    S: Sleeper,
{
    let mut attempts = 0u32;
    let mut failed = false;
    let mut delay = policy.pre_call_delay;

    loop {
        if !delay.is_zero() {
            sleeper.sleep(delay).await;
        }
        if cancel.is_cancelled() {
            debug!("[{label}] Cancelled before attempt {}", attempts + 1);
            return Attempted {
                value: None,
                stats: ApiStats { failures: failed as u32, resolved: 0 },
                attempts,
            };
        }

        attempts += 1;
        match operation().await {
            Ok(value) => {
                if failed {
                    debug!("[{label}] Succeeded after {attempts} attempts");
                }
                return Attempted {
                    value: Some(value),
                    stats: ApiStats { failures: failed as u32, resolved: failed as u32 },
                    attempts,
                };
            }
            Err(err) => {
                failed = true;
                let retry = attempts;
                match err.retry_cause() {
                    Some(cause) if retry <= policy.max_retries => {
                        delay = policy.delay_for(retry, cause);
                        warn!("[{label}] {err}, retry {retry}/{} in {delay:?}", policy.max_retries);
                    }
                    Some(_) => {
                        warn!("[{label}] {err}, giving up after {attempts} attempts");
                        break;
                    }
                    None => {
                        warn!("[{label}] {err}, not retrying");
                        break;
                    }
                }
            }
        }
    }

    Attempted {
        value: None,
        stats: ApiStats { failures: 1, resolved: 0 },
        attempts,
    }
}
