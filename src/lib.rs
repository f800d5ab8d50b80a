//! Parkmenu Core Library
//!
//! This library builds a nutrition catalog for theme-park dining: menu rows
//! are scraped from park sites, reconciled across sources, enriched with
//! estimated nutrition, reviewed, audited and synced to a hosted catalog.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`catalog`] - Parks, restaurants, menu items, nutrition and allergens
//! - [`normalize`] / [`matching`] - Name keys and fuzzy reconciliation
//! - [`classify`] / [`allergens`] - Keyword-based item tagging
//! - [`scrape`] - Polite page fetching, extraction and staging
//! - [`merge`] - Cross-source merging and catalog import
//! - [`estimate`] / [`review`] - k-NN nutrition estimates and their approval queue
//! - [`audit`] - Data-quality rules and automatic fixes
//! - [`sync`] - PostgREST client for the hosted catalog

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod allergens;
pub mod audit;
pub mod catalog;
pub mod classify;
pub mod db;
pub mod estimate;
pub mod matching;
pub mod merge;
pub mod normalize;
pub mod review;
pub mod scrape;
pub mod sync;
mod user_agent;

// Re-export commonly used types
pub use audit::{AuditReport, AuditRule, FixSummary, Severity, apply_fixes, audit_catalog};
pub use catalog::{
    Catalog, CatalogDump, CatalogError, CatalogRepository, Category, MenuItem, NutritionFacts,
    NutritionSource, RestoreSummary,
};
pub use db::Database;
pub use estimate::{EstimatorConfig, estimate_missing};
pub use merge::{MergeThresholds, run_merge};
pub use review::{EstimateStatus, Review, ReviewError};
pub use scrape::{
    DEFAULT_MAX_RETRIES, DEFAULT_RATE_LIMIT_MS, FailureType, RateLimiter, RetryDecision,
    RetryPolicy, ScrapeError, Scraper, SiteProfile, Staging,
};
pub use sync::{RemoteCatalog, SyncError};
