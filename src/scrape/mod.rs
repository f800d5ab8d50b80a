//! Menu-site scraping: fetch pages politely, extract menu rows, stage them.
//!
//! A [`SiteProfile`] describes one site (its pages and CSS selectors). The
//! [`Scraper`] fetches each page through the shared [`RateLimiter`] and
//! [`RetryPolicy`], [`extract_items`] turns HTML into [`ScrapedItem`]s, and
//! [`Staging`] stores them idempotently until the merge step runs.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use parkmenu_core::scrape::{RetryPolicy, Scraper, SiteProfile};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let profile = SiteProfile::load(std::path::Path::new("profiles/epcot.json"))?;
//! let scraper = Scraper::new(Duration::from_millis(1500), RetryPolicy::default())?;
//! let report = scraper.scrape_site(&profile).await;
//! println!("{} items, {} failed pages", report.items.len(), report.failed_pages.len());
//! # Ok(())
//! # }
//! ```

mod error;
mod extract;
pub mod rate_limiter;
mod retry;
mod staging;

pub use error::ScrapeError;
pub use extract::{extract_items, parse_calories, parse_price};
pub use rate_limiter::{RateLimiter, extract_domain, parse_retry_after};
pub use retry::{
    DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error,
    classify_http_status,
};
pub use staging::{StageSummary, StagedItem, Staging, parse_jsonl};

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{StreamExt, stream};
use reqwest::header::RETRY_AFTER;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::catalog::NutritionFacts;
use crate::normalize::normalize_name;
use crate::user_agent;

/// Default HTTP connect timeout.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout for a menu page.
const READ_TIMEOUT_SECS: u64 = 60;

/// Default delay between requests to the same site (milliseconds).
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1500;

/// Pages fetched concurrently per site.
const PAGE_CONCURRENCY: usize = 4;

/// Kind of site a record was scraped from. Higher priority wins conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// The park operator's own menus.
    Official,
    /// Review and menu aggregator sites.
    Aggregator,
    /// Fan blogs.
    Blog,
}

impl SourceKind {
    /// Conflict-resolution priority: official 3, aggregator 2, blog 1.
    #[must_use]
    pub fn priority(&self) -> u8 {
        match self {
            Self::Official => 3,
            Self::Aggregator => 2,
            Self::Blog => 1,
        }
    }

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Aggregator => "aggregator",
            Self::Blog => "blog",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "official" => Ok(Self::Official),
            "aggregator" => Ok(Self::Aggregator),
            "blog" => Ok(Self::Blog),
            _ => Err(format!("invalid source kind: {s}")),
        }
    }
}

/// One menu row as read from a source, before merging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedItem {
    pub source_kind: SourceKind,
    pub source_name: String,
    pub page_url: String,
    pub park: String,
    pub restaurant: String,
    #[serde(default)]
    pub land: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub nutrition: Option<NutritionFacts>,
}

impl ScrapedItem {
    /// Hex SHA-256 of the canonical record.
    ///
    /// Names enter the hash normalized, so cosmetic respellings from the same
    /// source stage once. Any change in content stages a new row.
    #[must_use]
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0x1f]);
        };

        field(self.source_kind.as_str());
        field(&self.source_name);
        field(&normalize_name(&self.park));
        field(&normalize_name(&self.restaurant));
        field(&self.land.as_deref().map(normalize_name).unwrap_or_default());
        field(&normalize_name(&self.name));
        field(self.description.as_deref().unwrap_or_default().trim());
        field(&self.price.map(|p| format!("{p:.2}")).unwrap_or_default());
        field(self.photo_url.as_deref().unwrap_or_default());
        field(
            &self
                .nutrition
                .and_then(|facts| serde_json::to_string(&facts).ok())
                .unwrap_or_default(),
        );

        let digest = hasher.finalize();
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }
}

/// CSS selectors for one site layout. Optional selectors leave the field empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorSet {
    /// One element per restaurant.
    pub restaurant: String,
    /// Restaurant name, inside a restaurant block.
    pub restaurant_name: String,
    #[serde(default)]
    pub land: Option<String>,
    /// One element per menu item, inside a restaurant block.
    pub item: String,
    /// Item name, inside an item.
    pub item_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    /// Element carrying `src` (or `data-src`).
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub calories: Option<String>,
}

/// Configuration for scraping one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Source name recorded on every item (e.g. `"disneyworld.com"`).
    pub name: String,
    pub source_kind: SourceKind,
    /// Park every page of this profile belongs to.
    pub park: String,
    pub pages: Vec<String>,
    pub selectors: SelectorSet,
}

impl SiteProfile {
    /// Reads and validates a JSON profile.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Profile`] if the file is unreadable or malformed,
    /// and [`ScrapeError::Selector`] if a selector does not parse.
    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScrapeError::profile(path, e.to_string()))?;
        let profile: Self =
            serde_json::from_str(&raw).map_err(|e| ScrapeError::profile(path, e.to_string()))?;
        if profile.pages.is_empty() {
            return Err(ScrapeError::profile(path, "profile lists no pages"));
        }
        extract::CompiledSelectors::compile(&profile.selectors)?;
        Ok(profile)
    }
}

/// Outcome of scraping one site.
#[derive(Debug, Default)]
pub struct ScrapeReport {
    pub items: Vec<ScrapedItem>,
    pub pages_ok: usize,
    /// `(url, error message)` for every page that could not be processed.
    pub failed_pages: Vec<(String, String)>,
}

/// Polite page fetcher.
#[derive(Debug, Clone)]
pub struct Scraper {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl Scraper {
    /// Creates a scraper with the given per-site delay and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(rate_limit: Duration, retry: RetryPolicy) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(READ_TIMEOUT_SECS))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(ScrapeError::ClientBuild)?;

        Ok(Self {
            client,
            limiter: Arc::new(RateLimiter::new(rate_limit)),
            retry,
        })
    }

    /// Returns the shared rate limiter.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    async fn fetch_once(&self, url: &str) -> Result<String, ScrapeError> {
        self.limiter.acquire(url).await;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ScrapeError::timeout(url)
            } else if e.is_builder() {
                ScrapeError::invalid_url(url)
            } else {
                ScrapeError::network(url, e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            return Err(ScrapeError::http_status_with_retry_after(
                url,
                status.as_u16(),
                retry_after,
            ));
        }

        response.text().await.map_err(|e| ScrapeError::network(url, e))
    }

    /// Fetches a page body, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the last error once the retry policy gives up.
    #[instrument(skip(self))]
    pub async fn fetch_page(&self, url: &str) -> Result<String, ScrapeError> {
        let mut attempt = 1;
        loop {
            match self.fetch_once(url).await {
                Ok(body) => {
                    debug!(bytes = body.len(), attempt, "page fetched");
                    return Ok(body);
                }
                Err(error) => {
                    if let Some(delay) = error.retry_after().and_then(parse_retry_after) {
                        self.limiter.record_rate_limit(url, delay).await;
                    }
                    match self.retry.should_retry(classify_error(&error), attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next,
                        } => {
                            warn!(error = %error, attempt, "fetch failed, retrying");
                            tokio::time::sleep(delay).await;
                            attempt = next;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            debug!(reason = %reason, "giving up on page");
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    /// Scrapes every page of a profile. Failed pages are logged and skipped.
    #[instrument(skip(self, profile), fields(site = %profile.name, pages = profile.pages.len()))]
    pub async fn scrape_site(&self, profile: &SiteProfile) -> ScrapeReport {
        let mut report = ScrapeReport::default();

        // Pages on one domain still serialize through the rate limiter.
        let mut outcomes = stream::iter(&profile.pages)
            .map(|page| async move {
                let outcome = match self.fetch_page(page).await {
                    Ok(html) => extract_items(&html, profile, page),
                    Err(error) => Err(error),
                };
                (page, outcome)
            })
            .buffered(PAGE_CONCURRENCY);

        while let Some((page, outcome)) = outcomes.next().await {
            match outcome {
                Ok(items) => {
                    debug!(url = %page, count = items.len(), "page extracted");
                    report.pages_ok += 1;
                    report.items.extend(items);
                }
                Err(error) => {
                    warn!(url = %page, error = %error, "page failed, continuing");
                    report.failed_pages.push((page.clone(), error.to_string()));
                }
            }
        }

        info!(
            items = report.items.len(),
            pages_ok = report.pages_ok,
            pages_failed = report.failed_pages.len(),
            "site scraped"
        );
        report
    }
}
