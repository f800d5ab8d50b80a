//! Client for the hosted PostgREST catalog.
//!
//! `pull` mirrors the remote tables into the local catalog, matching rows
//! by name. `push` upserts local nutrition and allergens back.

mod error;

pub use error::SyncError;

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, RANGE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::catalog::{
    AllergenRecord, Catalog, CatalogDump, MenuItem, NutritionRecord, Park, Restaurant,
    RestoreSummary,
};
use crate::scrape::{RetryDecision, RetryPolicy};
use crate::user_agent;

/// Rows requested per page when reading a table.
pub const PAGE_SIZE: usize = 1000;

/// Rows sent per upsert request.
pub const UPSERT_BATCH_SIZE: usize = 500;

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Counts from [`RemoteCatalog::push`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushSummary {
    pub nutrition: usize,
    pub allergens: usize,
}

/// PostgREST client for the hosted catalog.
#[derive(Debug, Clone)]
pub struct RemoteCatalog {
    client: reqwest::Client,
    rest_base: String,
    retry: RetryPolicy,
}

impl RemoteCatalog {
    /// Creates a client for the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidUrl`] for an unusable URL or key and
    /// [`SyncError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, SyncError> {
        let parsed = Url::parse(base_url).map_err(|_| SyncError::InvalidUrl {
            url: base_url.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SyncError::InvalidUrl {
                url: base_url.to_string(),
            });
        }

        let invalid_key = || SyncError::InvalidUrl {
            url: base_url.to_string(),
        };
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key).map_err(|_| invalid_key())?;
        key.set_sensitive(true);
        headers.insert("apikey", key);
        let mut bearer =
            HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|_| invalid_key())?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(SyncError::ClientBuild)?;

        Ok(Self {
            client,
            rest_base: format!("{}/rest/v1", base_url.trim_end_matches('/')),
            retry: RetryPolicy::default(),
        })
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn table_url(&self, table: &str, query: &[(&str, &str)]) -> Result<Url, SyncError> {
        let raw = format!("{}/{table}", self.rest_base);
        let mut url = Url::parse(&raw).map_err(|_| SyncError::InvalidUrl { url: raw.clone() })?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    /// Sends a request built by `build`, retrying 429 and 5xx responses.
    async fn send<F>(&self, url: &Url, build: F) -> Result<reqwest::Response, SyncError>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let outcome = match build().send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                // Past the last row; PostgREST answers 416 for an empty range.
                Ok(response) if response.status().as_u16() == 416 => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    SyncError::Http {
                        url: url.to_string(),
                        status,
                        body,
                    }
                }
                Err(source) => SyncError::Network {
                    url: url.to_string(),
                    source,
                },
            };

            match self.retry.should_retry(outcome.failure_type(), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(error = %outcome, attempt, "hosted catalog request failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(reason = %reason, "giving up on request");
                    return Err(outcome);
                }
            }
        }
    }

    /// Reads every row of a table, a page at a time.
    ///
    /// Rows that do not decode as `T` are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] for a failed page and
    /// [`SyncError::Decode`] for a page that is not a JSON array.
    pub async fn fetch_table<T: DeserializeOwned>(&self, table: &str) -> Result<Vec<T>, SyncError> {
        Ok(self.fetch_rows(table).await?.0)
    }

    /// Like [`RemoteCatalog::fetch_table`], also returning the skipped row count.
    #[instrument(skip(self))]
    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        table: &str,
    ) -> Result<(Vec<T>, usize), SyncError> {
        let url = self.table_url(table, &[("select", "*")])?;
        let mut rows = Vec::new();
        let mut skipped = 0;
        let mut offset = 0;

        loop {
            let range = format!("{offset}-{}", offset + PAGE_SIZE - 1);
            let response = self
                .send(&url, || {
                    self.client
                        .get(url.clone())
                        .header("Range-Unit", "items")
                        .header(RANGE, range.as_str())
                })
                .await?;
            if response.status().as_u16() == 416 {
                break;
            }

            let page: Vec<serde_json::Value> =
                response.json().await.map_err(|e| SyncError::Decode {
                    table: table.to_string(),
                    message: e.to_string(),
                })?;
            let count = page.len();
            for (index, value) in page.into_iter().enumerate() {
                match serde_json::from_value::<T>(value) {
                    Ok(row) => rows.push(row),
                    Err(error) => {
                        warn!(row = offset + index, error = %error, "undecodable row skipped");
                        skipped += 1;
                    }
                }
            }
            debug!(offset, count, "page read");
            if count < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        info!(rows = rows.len(), skipped, "table fetched");
        Ok((rows, skipped))
    }

    /// Upserts rows in batches, merging on `on_conflict`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Http`] if a batch is refused.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn upsert_rows<T: Serialize + Sync>(
        &self,
        table: &str,
        rows: &[T],
        on_conflict: &str,
    ) -> Result<usize, SyncError> {
        let url = self.table_url(table, &[("on_conflict", on_conflict)])?;
        let mut sent = 0;
        for batch in rows.chunks(UPSERT_BATCH_SIZE) {
            self.send(&url, || {
                self.client
                    .post(url.clone())
                    .header("Prefer", "resolution=merge-duplicates,return=minimal")
                    .json(batch)
            })
            .await?;
            sent += batch.len();
            debug!(sent, "batch upserted");
        }
        Ok(sent)
    }

    /// Reads every hosted catalog table into a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if a table cannot be fetched.
    pub async fn fetch_dump(&self) -> Result<CatalogDump, SyncError> {
        Ok(self.fetch_snapshot().await?.0)
    }

    #[instrument(skip(self))]
    async fn fetch_snapshot(&self) -> Result<(CatalogDump, usize), SyncError> {
        let (parks, skipped_parks) = self.fetch_rows::<Park>("parks").await?;
        let (restaurants, skipped_restaurants) =
            self.fetch_rows::<Restaurant>("restaurants").await?;
        let (menu_items, skipped_items) = self.fetch_rows::<MenuItem>("menu_items").await?;
        let (nutrition, skipped_nutrition) = self
            .fetch_rows::<NutritionRecord>("nutritional_data")
            .await?;
        let (allergens, skipped_allergens) =
            self.fetch_rows::<AllergenRecord>("allergens").await?;
        let skipped = skipped_parks
            + skipped_restaurants
            + skipped_items
            + skipped_nutrition
            + skipped_allergens;

        let dump = CatalogDump {
            parks,
            restaurants,
            menu_items,
            nutrition,
            allergens,
        };
        Ok((dump, skipped))
    }

    /// Mirrors the hosted tables into the local catalog.
    ///
    /// Rows are matched to local rows by name (see [`Catalog::restore`]) and
    /// stored without validation. Rows that do not decode or cannot be
    /// stored (for example an orphaned item) are logged and counted as
    /// failed. Nothing is written unless every table was fetched.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if a table cannot be fetched.
    #[instrument(skip(self, catalog))]
    pub async fn pull(&self, catalog: &Catalog) -> Result<RestoreSummary, SyncError> {
        let (dump, skipped) = self.fetch_snapshot().await?;
        let mut summary = catalog.restore(&dump).await;
        summary.failed += skipped;
        info!(failed = summary.failed, skipped, "hosted catalog pulled");
        Ok(summary)
    }

    /// Upserts local nutrition and allergens to the hosted catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] if local rows cannot be read or a batch is refused.
    #[instrument(skip(self, catalog))]
    pub async fn push(&self, catalog: &Catalog) -> Result<PushSummary, SyncError> {
        let nutrition = catalog.list_nutrition().await?;
        let allergens = catalog.list_allergens().await?;

        let summary = PushSummary {
            nutrition: self
                .upsert_rows("nutritional_data", &nutrition, "menu_item_id")
                .await?,
            allergens: self
                .upsert_rows("allergens", &allergens, "menu_item_id,allergen_type")
                .await?,
        };

        info!(
            nutrition = summary.nutrition,
            allergens = summary.allergens,
            "local catalog pushed"
        );
        Ok(summary)
    }
}
