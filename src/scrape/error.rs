//! Error types for the scrape module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching, parsing or staging menu pages.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The page that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The page that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The page that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
        /// The Retry-After header value, if present (for 429 responses).
        retry_after: Option<String>,
    },

    /// The page URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A CSS selector in a site profile does not parse.
    #[error("invalid selector '{selector}' for {field}: {message}")]
    Selector {
        /// Profile field holding the selector.
        field: &'static str,
        /// The selector text.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// A site profile could not be read or decoded.
    #[error("invalid site profile {path}: {message}\n  Suggestion: Check the profile JSON against the documented fields")]
    Profile {
        /// The profile path.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A JSON-lines record could not be decoded.
    #[error("invalid scraped record at line {line}: {source}")]
    Record {
        /// 1-based line number in the input.
        line: usize,
        /// The decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// Writing to the staging table failed.
    #[error("staging failed: {0}")]
    Staging(#[from] sqlx::Error),
}

impl ScrapeError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after: None,
        }
    }

    /// Creates an HTTP status error with a Retry-After header value.
    pub fn http_status_with_retry_after(
        url: impl Into<String>,
        status: u16,
        retry_after: Option<String>,
    ) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
            retry_after,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a profile error.
    pub fn profile(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Profile {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns the Retry-After header carried by a 429/503 response, if any.
    #[must_use]
    pub fn retry_after(&self) -> Option<&str> {
        match self {
            Self::HttpStatus { retry_after, .. } => retry_after.as_deref(),
            _ => None,
        }
    }
}
