//! Review queue row and status types.

use std::fmt;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::ReviewError;
use crate::catalog::NutritionFacts;

/// Lifecycle of a queued estimate: pending, then approved or rejected, then
/// imported once approved values are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateStatus {
    Pending,
    Approved,
    Rejected,
    Imported,
}

impl EstimateStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Rejected, Self::Imported];

    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Imported => "imported",
        }
    }
}

impl fmt::Display for EstimateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EstimateStatus {
    type Err = ReviewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "imported" => Ok(Self::Imported),
            _ => Err(ReviewError::InvalidStatus(s.to_string())),
        }
    }
}

/// A queued estimate as stored.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct EstimateRecord {
    pub id: i64,
    pub menu_item_id: i64,
    /// JSON-encoded [`NutritionFacts`].
    #[sqlx(rename = "facts")]
    #[serde(skip)]
    pub facts_json: String,
    pub confidence_score: i64,
    /// JSON array of neighbour item ids.
    #[sqlx(rename = "neighbors")]
    #[serde(skip)]
    pub neighbors_json: String,
    #[sqlx(rename = "status")]
    #[serde(rename = "status")]
    pub status_str: String,
    pub note: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl EstimateRecord {
    /// Returns the parsed status, `Pending` if the stored value is invalid.
    #[must_use]
    pub fn status(&self) -> EstimateStatus {
        self.status_str.parse().unwrap_or(EstimateStatus::Pending)
    }

    /// Decodes the estimated nutrition.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError::Payload`] if the column is not valid JSON.
    pub fn facts(&self) -> Result<NutritionFacts, ReviewError> {
        serde_json::from_str(&self.facts_json).map_err(|e| ReviewError::Payload {
            id: self.id,
            column: "facts",
            message: e.to_string(),
        })
    }

    /// Returns the neighbour item ids. An undecodable column yields none.
    #[must_use]
    pub fn neighbor_ids(&self) -> Vec<i64> {
        serde_json::from_str(&self.neighbors_json).unwrap_or_default()
    }
}
