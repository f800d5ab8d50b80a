//! Error types for the hosted catalog client.

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::scrape::{FailureType, classify_http_status};

/// Errors talking to the hosted catalog.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        /// Response body, usually a PostgREST error object.
        body: String,
    },

    /// The request never got a response.
    #[error("network error reaching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A response body did not decode as the expected rows.
    #[error("could not decode rows from {table}: {message}")]
    Decode { table: String, message: String },

    /// The configured base URL is unusable.
    #[error("invalid hosted catalog URL '{url}'\n  Suggestion: Set supabase_url in the config file or PARKMENU_SUPABASE_URL")]
    InvalidUrl { url: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Writing pulled rows or reading local rows failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl SyncError {
    /// Classifies the error for retry decisions.
    #[must_use]
    pub fn failure_type(&self) -> FailureType {
        match self {
            Self::Http { status, .. } => classify_http_status(*status),
            Self::Network { .. } => FailureType::Transient,
            Self::Decode { .. } | Self::InvalidUrl { .. } | Self::ClientBuild(_) | Self::Catalog(_) => {
                FailureType::Permanent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> SyncError {
        SyncError::Http {
            url: "https://db.example/rest/v1/parks".to_string(),
            status,
            body: "{}".to_string(),
        }
    }

    #[test]
    fn test_failure_type_retries_rate_limits_and_server_errors() {
        assert_eq!(http(429).failure_type(), FailureType::RateLimited);
        assert_eq!(http(503).failure_type(), FailureType::Transient);
        assert_eq!(http(400).failure_type(), FailureType::Permanent);
        assert_eq!(http(401).failure_type(), FailureType::NeedsAuth);
    }

    #[test]
    fn test_http_message_includes_body() {
        let msg = http(409).to_string();
        assert!(msg.contains("409"));
        assert!(msg.contains("rest/v1/parks"));
    }
}
