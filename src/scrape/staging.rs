//! Idempotent staging of scraped rows in `scraped_items`.

use sqlx::FromRow;
use tracing::{debug, info, instrument, warn};

use super::{ScrapeError, ScrapedItem};
use crate::db::Database;

/// Result of staging a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageSummary {
    pub inserted: usize,
    /// Rows whose content hash was already staged.
    pub duplicates: usize,
}

/// A staged row awaiting merge.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedItem {
    pub id: i64,
    pub item: ScrapedItem,
}

#[derive(FromRow)]
struct StagedRow {
    id: i64,
    payload: String,
}

/// Staging table access.
#[derive(Debug, Clone)]
pub struct Staging {
    db: Database,
}

impl Staging {
    /// Creates staging access over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stages items, ignoring any whose content hash is already present.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Staging`] if an insert fails.
    #[instrument(skip(self, items), fields(count = items.len()))]
    pub async fn stage(&self, items: &[ScrapedItem]) -> Result<StageSummary, ScrapeError> {
        let mut summary = StageSummary::default();
        let mut tx = self.db.pool().begin().await?;

        for item in items {
            let payload = serde_json::to_string(item).map_err(|source| ScrapeError::Record {
                line: 0,
                source,
            })?;
            let result = sqlx::query(
                r"INSERT INTO scraped_items (content_hash, source_kind, source_name, page_url, payload)
                  VALUES (?, ?, ?, ?, ?)
                  ON CONFLICT(content_hash) DO NOTHING",
            )
            .bind(item.content_hash())
            .bind(item.source_kind.as_str())
            .bind(&item.source_name)
            .bind(&item.page_url)
            .bind(payload)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                summary.duplicates += 1;
            } else {
                summary.inserted += 1;
            }
        }

        tx.commit().await?;
        info!(
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            "items staged"
        );
        Ok(summary)
    }

    /// Returns staged rows not yet merged, in staging order.
    ///
    /// Rows whose payload no longer decodes are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Staging`] if the query fails.
    pub async fn unmerged(&self) -> Result<Vec<StagedItem>, ScrapeError> {
        let rows = sqlx::query_as::<_, StagedRow>(
            "SELECT id, payload FROM scraped_items WHERE merged = 0 ORDER BY id",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match serde_json::from_str(&row.payload) {
                Ok(item) => Some(StagedItem { id: row.id, item }),
                Err(error) => {
                    warn!(id = row.id, error = %error, "undecodable staged payload, skipping");
                    None
                }
            })
            .collect())
    }

    /// Marks staged rows as merged.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Staging`] if an update fails.
    pub async fn mark_merged(&self, ids: &[i64]) -> Result<(), ScrapeError> {
        let mut tx = self.db.pool().begin().await?;
        for id in ids {
            sqlx::query("UPDATE scraped_items SET merged = 1 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(count = ids.len(), "staged rows marked merged");
        Ok(())
    }

    /// Counts staged rows, split into `(pending, merged)`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Staging`] if the query fails.
    pub async fn counts(&self) -> Result<(i64, i64), ScrapeError> {
        let (pending, merged): (i64, i64) = sqlx::query_as(
            r"SELECT
                COALESCE(SUM(CASE WHEN merged = 0 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN merged = 1 THEN 1 ELSE 0 END), 0)
              FROM scraped_items",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok((pending, merged))
    }
}

/// Parses JSON-lines scraper output. Blank lines are ignored.
///
/// Malformed lines are returned as [`ScrapeError::Record`] alongside the
/// records that did parse.
#[must_use]
pub fn parse_jsonl(input: &str) -> (Vec<ScrapedItem>, Vec<ScrapeError>) {
    let mut items = Vec::new();
    let mut errors = Vec::new();

    for (index, line) in input.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<ScrapedItem>(line) {
            Ok(item) => items.push(item),
            Err(source) => errors.push(ScrapeError::Record {
                line: index + 1,
                source,
            }),
        }
    }

    (items, errors)
}
