//! Per-domain politeness delay for scraping.
//!
//! Requests to the same host are spaced at least `default_delay` apart; requests
//! to different hosts never wait on each other. A server-mandated
//! `Retry-After` pushes the host's next slot further out.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use parkmenu_core::scrape::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::new(Duration::from_millis(1500));
//! limiter.acquire("https://menus.example/magic-kingdom").await; // immediate
//! limiter.acquire("https://menus.example/epcot").await;         // waits ~1.5s
//! limiter.acquire("https://blog.example/snacks").await;         // immediate
//! # }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Warning threshold for cumulative delay per domain.
const CUMULATIVE_DELAY_WARNING_THRESHOLD: Duration = Duration::from_secs(30);

/// Upper bound on a honoured Retry-After value.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Per-domain rate limiter shared across fetches.
#[derive(Debug)]
pub struct RateLimiter {
    default_delay: Duration,
    disabled: bool,
    /// `Arc` so the `DashMap` shard lock is released before awaiting the inner mutex.
    domains: DashMap<String, Arc<DomainState>>,
}

#[derive(Debug)]
struct DomainState {
    /// Earliest instant the next request may start. `None` until the first request.
    next_allowed: Mutex<Option<Instant>>,
    cumulative_delay_ms: AtomicU64,
}

impl DomainState {
    fn new() -> Self {
        Self {
            next_allowed: Mutex::new(None),
            cumulative_delay_ms: AtomicU64::new(0),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn add_cumulative_delay(&self, delay: Duration) -> Duration {
        let delay_ms = delay.as_millis() as u64;
        let new_total = self
            .cumulative_delay_ms
            .fetch_add(delay_ms, Ordering::SeqCst)
            + delay_ms;
        Duration::from_millis(new_total)
    }
}

impl RateLimiter {
    /// Creates a limiter with the given minimum spacing per domain.
    #[must_use]
    #[instrument(skip_all, fields(delay_ms = default_delay.as_millis()))]
    pub fn new(default_delay: Duration) -> Self {
        debug!("creating rate limiter");
        Self {
            default_delay,
            disabled: default_delay.is_zero(),
            domains: DashMap::new(),
        }
    }

    /// Creates a limiter that never waits (`--rate-limit 0`).
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Returns whether rate limiting is disabled.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Returns the default delay between requests.
    #[must_use]
    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    fn state_for(&self, domain: &str) -> Arc<DomainState> {
        self.domains
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(DomainState::new()))
            .clone()
    }

    /// Waits until a request to the URL's domain is allowed, then claims the slot.
    ///
    /// The first request to a domain proceeds immediately.
    #[instrument(skip(self), fields(domain))]
    pub async fn acquire(&self, url: &str) {
        let domain = extract_domain(url);
        tracing::Span::current().record("domain", domain.as_str());

        let state = self.state_for(&domain);
        let mut next_allowed = state.next_allowed.lock().await;

        if let Some(ready_at) = *next_allowed {
            let now = Instant::now();
            if ready_at > now {
                let delay = ready_at - now;
                let cumulative = state.add_cumulative_delay(delay);
                debug!(
                    domain = %domain,
                    delay_ms = delay.as_millis(),
                    cumulative_ms = cumulative.as_millis(),
                    "applying rate limit delay"
                );
                if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
                    warn!(
                        domain = %domain,
                        cumulative_delay_secs = cumulative.as_secs(),
                        "excessive rate limiting - consider fewer pages for this site"
                    );
                }
                tokio::time::sleep_until(ready_at).await;
            }
        } else {
            debug!(domain = %domain, "first request to domain - no delay");
        }

        if !self.disabled {
            *next_allowed = Some(Instant::now() + self.default_delay);
        }
    }

    /// Records a server-mandated delay (from `Retry-After`).
    ///
    /// The next [`acquire`](Self::acquire) for the domain waits at least this long.
    /// Applies even when the limiter is disabled.
    #[instrument(skip(self), fields(domain))]
    pub async fn record_rate_limit(&self, url: &str, delay: Duration) {
        let domain = extract_domain(url);
        tracing::Span::current().record("domain", domain.as_str());

        let state = self.state_for(&domain);
        let cumulative = state.add_cumulative_delay(delay);
        let mut next_allowed = state.next_allowed.lock().await;
        let ready_at = Instant::now() + delay.min(MAX_RETRY_AFTER);
        if next_allowed.is_none_or(|current| current < ready_at) {
            *next_allowed = Some(ready_at);
        }

        debug!(
            domain = %domain,
            delay_ms = delay.as_millis(),
            cumulative_ms = cumulative.as_millis(),
            "recorded server rate limit"
        );
        if cumulative >= CUMULATIVE_DELAY_WARNING_THRESHOLD {
            warn!(
                domain = %domain,
                cumulative_delay_secs = cumulative.as_secs(),
                "excessive server rate limiting - site may be under heavy load"
            );
        }
    }
}

/// Extracts the lowercase host of a URL, or `"unknown"` when it does not parse.
///
/// ```
/// use parkmenu_core::scrape::extract_domain;
///
/// assert_eq!(extract_domain("https://Menus.Example.COM/epcot"), "menus.example.com");
/// assert_eq!(extract_domain("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a `Retry-After` value: integer seconds or an HTTP-date.
///
/// Negative and unparseable values give `None`. Past dates give zero. Values
/// are capped at one hour.
///
/// ```
/// use std::time::Duration;
/// use parkmenu_core::scrape::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    match httpdate::parse_http_date(header_value) {
        Ok(datetime) => Some(
            datetime
                .duration_since(std::time::SystemTime::now())
                .map_or(Duration::ZERO, |duration| duration.min(MAX_RETRY_AFTER)),
        ),
        Err(_) => {
            debug!(header_value, "unparseable Retry-After value");
            None
        }
    }
}
