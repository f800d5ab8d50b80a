//! Review queue for estimated nutrition.
//!
//! Estimates are held here until someone approves or rejects them. Approved
//! rows are written to the catalog by [`Review::import_approved`].

mod error;
mod item;

pub use error::ReviewError;
pub use item::{EstimateRecord, EstimateStatus};

use serde::Serialize;
use sqlx::Row;
use tracing::{debug, info, instrument, warn};

use crate::catalog::{CatalogError, CatalogRepository, NutritionFacts, NutritionSource};
use crate::db::Database;
use crate::estimate::Estimate;

/// Result type for review operations.
pub type Result<T> = std::result::Result<T, ReviewError>;

const SELECT_ESTIMATE: &str = r"SELECT id, menu_item_id, facts, confidence_score, neighbors,
       status, note, created_at, updated_at
  FROM nutrition_estimates";

/// Counts from [`Review::import_approved`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReviewImportSummary {
    pub imported: usize,
    /// Approved rows whose item gained nutrition from elsewhere meanwhile.
    pub skipped_existing: usize,
    pub rejected_invalid: usize,
}

/// Review queue manager.
#[derive(Debug, Clone)]
pub struct Review {
    db: Database,
}

impl Review {
    /// Creates a review queue over the given database.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Queues an estimate as pending, replacing any older pending estimate
    /// for the same item.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the write fails.
    #[instrument(skip(self, estimate), fields(menu_item_id = estimate.menu_item_id, confidence = estimate.confidence))]
    pub async fn enqueue(&self, estimate: &Estimate) -> Result<i64> {
        let facts = serde_json::to_string(&estimate.facts).map_err(|e| ReviewError::Payload {
            id: 0,
            column: "facts",
            message: e.to_string(),
        })?;
        let neighbor_ids: Vec<i64> = estimate.neighbors.iter().map(|n| n.menu_item_id).collect();
        let neighbors = serde_json::to_string(&neighbor_ids).map_err(|e| ReviewError::Payload {
            id: 0,
            column: "neighbors",
            message: e.to_string(),
        })?;

        let mut tx = self.db.pool().begin().await?;
        let replaced = sqlx::query(
            "DELETE FROM nutrition_estimates WHERE menu_item_id = ? AND status = 'pending'",
        )
        .bind(estimate.menu_item_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let id: i64 = sqlx::query_scalar(
            r"INSERT INTO nutrition_estimates (menu_item_id, facts, confidence_score, neighbors)
              VALUES (?, ?, ?, ?)
              RETURNING id",
        )
        .bind(estimate.menu_item_id)
        .bind(facts)
        .bind(estimate.confidence)
        .bind(neighbors)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(id, replaced, "estimate queued");
        Ok(id)
    }

    /// Returns one estimate.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the query fails.
    pub async fn get(&self, id: i64) -> Result<Option<EstimateRecord>> {
        let record = sqlx::query_as::<_, EstimateRecord>(&format!("{SELECT_ESTIMATE} WHERE id = ?"))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(record)
    }

    /// Returns estimates in one status, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the query fails.
    pub async fn list_by_status(&self, status: EstimateStatus) -> Result<Vec<EstimateRecord>> {
        let records = sqlx::query_as::<_, EstimateRecord>(&format!(
            "{SELECT_ESTIMATE} WHERE status = ? ORDER BY id"
        ))
        .bind(status.as_str())
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Returns every estimate, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the query fails.
    pub async fn list_all(&self) -> Result<Vec<EstimateRecord>> {
        let records = sqlx::query_as::<_, EstimateRecord>(&format!("{SELECT_ESTIMATE} ORDER BY id"))
            .fetch_all(self.db.pool())
            .await?;
        Ok(records)
    }

    /// Counts estimates in one status.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the query fails.
    pub async fn count_by_status(&self, status: EstimateStatus) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM nutrition_estimates WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(self.db.pool())
            .await?;
        Ok(row.get("count"))
    }

    /// Approves a pending estimate.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::EstimateNotFound`] for an unknown id and
    /// [`ReviewError::InvalidTransition`] if the estimate is not pending.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: i64) -> Result<()> {
        self.decide(id, EstimateStatus::Approved, None).await
    }

    /// Rejects a pending estimate, keeping an optional reviewer note.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::EstimateNotFound`] for an unknown id and
    /// [`ReviewError::InvalidTransition`] if the estimate is not pending.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: i64, note: Option<&str>) -> Result<()> {
        self.decide(id, EstimateStatus::Rejected, note).await
    }

    async fn decide(&self, id: i64, to: EstimateStatus, note: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE nutrition_estimates
              SET status = ?, note = COALESCE(?, note), updated_at = datetime('now')
              WHERE id = ? AND status = 'pending'",
        )
        .bind(to.as_str())
        .bind(note)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() > 0 {
            info!(id, status = %to, "estimate reviewed");
            return Ok(());
        }
        match self.get(id).await? {
            None => Err(ReviewError::EstimateNotFound(id)),
            Some(record) => Err(ReviewError::InvalidTransition {
                id,
                from: record.status(),
                to,
            }),
        }
    }

    /// Approves every pending estimate at or above `min_confidence`.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn approve_above(&self, min_confidence: i64) -> Result<u64> {
        let approved = sqlx::query(
            r"UPDATE nutrition_estimates
              SET status = 'approved', updated_at = datetime('now')
              WHERE status = 'pending' AND confidence_score >= ?",
        )
        .bind(min_confidence)
        .execute(self.db.pool())
        .await?
        .rows_affected();

        info!(approved, "pending estimates approved in bulk");
        Ok(approved)
    }

    async fn set_status(&self, id: i64, status: EstimateStatus, note: Option<&str>) -> Result<()> {
        sqlx::query(
            r"UPDATE nutrition_estimates
              SET status = ?, note = COALESCE(?, note), updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(note)
        .bind(id)
        .execute(self.db.pool())
        .await?;
        Ok(())
    }

    /// Writes approved estimates to the catalog as `estimated` nutrition.
    ///
    /// Rows that fail validation are rejected with the reason as note. Items
    /// that already have nutrition keep it. Catalog failures on one row are
    /// logged and the row stays approved for the next run.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Database`] if the queue cannot be read or updated.
    #[instrument(skip(self, repo))]
    pub async fn import_approved(&self, repo: &dyn CatalogRepository) -> Result<ReviewImportSummary> {
        let mut summary = ReviewImportSummary::default();

        for record in self.list_by_status(EstimateStatus::Approved).await? {
            let facts = match record.facts() {
                Ok(facts) => facts,
                Err(error) => {
                    warn!(id = record.id, error = %error, "estimate payload unreadable, rejecting");
                    self.set_status(record.id, EstimateStatus::Rejected, Some(&error.to_string()))
                        .await?;
                    summary.rejected_invalid += 1;
                    continue;
                }
            };
            if let Err(reason) = facts.validate() {
                warn!(id = record.id, reason = %reason, "estimate failed validation, rejecting");
                self.set_status(record.id, EstimateStatus::Rejected, Some(&reason))
                    .await?;
                summary.rejected_invalid += 1;
                continue;
            }

            let written = match write_if_missing(repo, &record, &facts).await {
                Ok(written) => written,
                Err(error) => {
                    warn!(id = record.id, error = %error, "estimate import failed, will retry");
                    continue;
                }
            };
            if written {
                summary.imported += 1;
            } else {
                debug!(id = record.id, menu_item_id = record.menu_item_id, "item already has nutrition");
                summary.skipped_existing += 1;
            }
            self.set_status(record.id, EstimateStatus::Imported, None).await?;
        }

        info!(
            imported = summary.imported,
            skipped_existing = summary.skipped_existing,
            rejected_invalid = summary.rejected_invalid,
            "approved estimates imported"
        );
        Ok(summary)
    }
}

async fn write_if_missing(
    repo: &dyn CatalogRepository,
    record: &EstimateRecord,
    facts: &NutritionFacts,
) -> std::result::Result<bool, CatalogError> {
    if repo.get_nutrition(record.menu_item_id).await?.is_some() {
        return Ok(false);
    }
    repo.upsert_nutrition(
        record.menu_item_id,
        facts,
        NutritionSource::Estimated,
        record.confidence_score,
    )
    .await?;
    Ok(true)
}
