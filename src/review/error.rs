//! Error types for the estimate review queue.

use thiserror::Error;

use super::EstimateStatus;
use crate::catalog::{CatalogError, DbErrorKind};

/// Errors that can occur during review operations.
#[derive(Debug, Clone, Error)]
pub enum ReviewError {
    /// Database operation failed.
    #[error("database error ({kind}): {message}")]
    Database {
        kind: DbErrorKind,
        message: String,
    },

    /// No estimate with this id.
    #[error(
        "estimate not found: id {0}\n  Suggestion: Run `parkmenu review list` to see queued estimates"
    )]
    EstimateNotFound(i64),

    /// The estimate is not in a state that allows the requested move.
    #[error("estimate {id} is {from}, cannot move to {to}\n  Suggestion: Only pending estimates can be approved or rejected")]
    InvalidTransition {
        id: i64,
        from: EstimateStatus,
        to: EstimateStatus,
    },

    /// A stored or requested status string is not recognised.
    #[error("invalid status '{0}'\n  Suggestion: Use one of: pending, approved, rejected, imported")]
    InvalidStatus(String),

    /// A stored payload column does not decode.
    #[error("estimate {id} has a malformed {column} column: {message}")]
    Payload {
        id: i64,
        column: &'static str,
        message: String,
    },

    /// Catalog read or write failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<sqlx::Error> for ReviewError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: DbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl ReviewError {
    /// Returns the typed database error kind, when this is a database error.
    #[must_use]
    pub fn database_kind(&self) -> Option<DbErrorKind> {
        match self {
            Self::Database { kind, .. } => Some(*kind),
            Self::Catalog(inner) => inner.database_kind(),
            Self::EstimateNotFound(_)
            | Self::InvalidTransition { .. }
            | Self::InvalidStatus(_)
            | Self::Payload { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message_has_suggestion() {
        let msg = ReviewError::EstimateNotFound(7).to_string();
        assert!(msg.contains("not found"));
        assert!(msg.contains('7'));
        assert!(msg.contains("Suggestion"));
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = ReviewError::InvalidTransition {
            id: 3,
            from: EstimateStatus::Imported,
            to: EstimateStatus::Approved,
        };
        let msg = err.to_string();
        assert!(msg.contains("imported"));
        assert!(msg.contains("approved"));
        assert_eq!(err.database_kind(), None);
    }

    #[test]
    fn test_database_kind_passes_through_catalog() {
        let err = ReviewError::from(CatalogError::Database {
            kind: DbErrorKind::BusyOrLocked,
            message: "database is locked".to_string(),
        });
        assert_eq!(err.database_kind(), Some(DbErrorKind::BusyOrLocked));
    }
}
