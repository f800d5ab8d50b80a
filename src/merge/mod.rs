//! Cross-source merge of staged menu rows.
//!
//! Staged rows are grouped by park, then fuzzy-clustered into restaurants and
//! items. Each item cluster is collapsed into one [`MergedItem`] by picking,
//! field by field, the value from the highest-priority source that has one.

mod import;

pub use import::{ImportSummary, import_merged};

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::catalog::{Catalog, CatalogError, NutritionFacts};
use crate::matching::{ITEM_MATCH_THRESHOLD, RESTAURANT_MATCH_THRESHOLD, cluster_by_name};
use crate::normalize::normalize_name;
use crate::scrape::{ScrapeError, SourceKind, StagedItem, Staging};

/// Minimum absolute price gap that counts as a disagreement.
const PRICE_CONFLICT_MIN_GAP: f64 = 0.50;

/// Relative price gap (of the lower price) that counts as a disagreement.
const PRICE_CONFLICT_RATIO: f64 = 0.10;

/// Errors from a merge run.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Staging(#[from] ScrapeError),
}

/// Fuzzy-match thresholds used when clustering and when matching the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeThresholds {
    pub restaurant: f64,
    pub item: f64,
}

impl Default for MergeThresholds {
    fn default() -> Self {
        Self {
            restaurant: RESTAURANT_MATCH_THRESHOLD,
            item: ITEM_MATCH_THRESHOLD,
        }
    }
}

/// Sources disagreeing on an item's price.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceConflict {
    /// Every `(source name, price)` reported for the item.
    pub prices: Vec<(String, f64)>,
}

/// One item reconciled across sources.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedItem {
    pub park: String,
    pub restaurant: String,
    pub land: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub photo_url: Option<String>,
    pub nutrition: Option<NutritionFacts>,
    /// Kind of the record the nutrition came from.
    pub nutrition_source: Option<SourceKind>,
    /// Kind of the highest-priority contributing record.
    pub winning_source: SourceKind,
    /// Distinct contributing source names, highest priority first.
    pub sources: Vec<String>,
    pub price_conflict: Option<PriceConflict>,
    /// Staging row ids folded into this item.
    pub staged_ids: Vec<i64>,
}

/// Returns `true` when two prices differ by more than `max(0.50, 10% of the lower)`.
#[must_use]
pub fn prices_conflict(a: f64, b: f64) -> bool {
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    high - low > PRICE_CONFLICT_MIN_GAP.max(PRICE_CONFLICT_RATIO * low)
}

fn detect_price_conflict(members: &[&StagedItem]) -> Option<PriceConflict> {
    let prices: Vec<(String, f64)> = members
        .iter()
        .filter_map(|staged| staged.item.price.map(|p| (staged.item.source_name.clone(), p)))
        .collect();

    let low = prices.iter().map(|(_, p)| *p).reduce(f64::min)?;
    let high = prices.iter().map(|(_, p)| *p).reduce(f64::max)?;
    // Checking the widest pair suffices.
    prices_conflict(low, high).then_some(PriceConflict { prices })
}

/// Collapses one item cluster. `members` must be non-empty.
fn resolve_cluster(mut members: Vec<&StagedItem>) -> Option<MergedItem> {
    // Stable sort keeps staging order among equal priorities.
    members.sort_by_key(|staged| std::cmp::Reverse(staged.item.source_kind.priority()));
    let top = members.first()?;

    let land = members.iter().find_map(|s| s.item.land.clone());
    let description = members.iter().find_map(|s| s.item.description.clone());
    let price = members.iter().find_map(|s| s.item.price);
    let photo_url = members.iter().find_map(|s| s.item.photo_url.clone());
    let nutrition_record = members
        .iter()
        .find(|s| s.item.nutrition.is_some_and(|facts| !facts.is_empty()));

    let mut sources: Vec<String> = Vec::new();
    for staged in &members {
        if !sources.contains(&staged.item.source_name) {
            sources.push(staged.item.source_name.clone());
        }
    }

    Some(MergedItem {
        park: top.item.park.trim().to_string(),
        restaurant: top.item.restaurant.trim().to_string(),
        land,
        name: top.item.name.trim().to_string(),
        description,
        price,
        photo_url,
        nutrition: nutrition_record.and_then(|s| s.item.nutrition),
        nutrition_source: nutrition_record.map(|s| s.item.source_kind),
        winning_source: top.item.source_kind,
        sources,
        price_conflict: detect_price_conflict(&members),
        staged_ids: members.iter().map(|s| s.id).collect(),
    })
}

/// Groups indices by key, keeping first-appearance order of keys.
fn group_by_key(keys: impl Iterator<Item = String>) -> Vec<Vec<usize>> {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (index, key) in keys.enumerate() {
        let slot = *positions.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(index);
    }
    groups
}

/// Merges staged rows into one [`MergedItem`] per real-world item.
///
/// Rows are expected in staging order; that order breaks priority ties.
#[must_use]
#[instrument(skip(staged), fields(rows = staged.len()))]
pub fn merge_items(staged: &[StagedItem], thresholds: &MergeThresholds) -> Vec<MergedItem> {
    let mut merged = Vec::new();

    for park_group in group_by_key(staged.iter().map(|s| normalize_name(&s.item.park))) {
        let restaurant_names: Vec<&str> = park_group
            .iter()
            .map(|&i| staged[i].item.restaurant.as_str())
            .collect();

        for venue in cluster_by_name(&restaurant_names, thresholds.restaurant) {
            let venue_rows: Vec<&StagedItem> =
                venue.iter().map(|&i| &staged[park_group[i]]).collect();
            let item_names: Vec<&str> = venue_rows.iter().map(|s| s.item.name.as_str()).collect();

            for cluster in cluster_by_name(&item_names, thresholds.item) {
                let members: Vec<&StagedItem> = cluster.iter().map(|&i| venue_rows[i]).collect();
                if let Some(item) = resolve_cluster(members) {
                    merged.push(item);
                }
            }
        }
    }

    debug!(merged = merged.len(), "merge complete");
    merged
}

/// Outcome of [`run_merge`].
#[derive(Debug, Clone, Default)]
pub struct MergeRun {
    pub staged_rows: usize,
    pub merged: Vec<MergedItem>,
    /// `None` for a dry run.
    pub import: Option<ImportSummary>,
}

/// Merges all unmerged staged rows and, unless `dry_run`, imports them.
///
/// Staged rows are marked merged only when their item imported cleanly.
///
/// # Errors
///
/// Returns [`MergeError`] if staging or catalog access fails outright.
#[instrument(skip(catalog, staging))]
pub async fn run_merge(
    catalog: &Catalog,
    staging: &Staging,
    thresholds: &MergeThresholds,
    dry_run: bool,
) -> Result<MergeRun, MergeError> {
    let staged = staging.unmerged().await?;
    let merged = merge_items(&staged, thresholds);

    let import = if dry_run {
        None
    } else {
        let summary = import_merged(catalog, &merged, thresholds).await?;
        staging.mark_merged(&summary.merged_ids).await?;
        Some(summary)
    };

    info!(
        staged = staged.len(),
        merged = merged.len(),
        dry_run,
        "merge run finished"
    );
    Ok(MergeRun {
        staged_rows: staged.len(),
        merged,
        import,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::scrape::ScrapedItem;

    fn staged(
        id: i64,
        kind: SourceKind,
        source: &str,
        restaurant: &str,
        name: &str,
        price: Option<f64>,
    ) -> StagedItem {
        StagedItem {
            id,
            item: ScrapedItem {
                source_kind: kind,
                source_name: source.to_string(),
                page_url: format!("https://{source}/page"),
                park: "Magic Kingdom".to_string(),
                restaurant: restaurant.to_string(),
                land: None,
                name: name.to_string(),
                description: None,
                price,
                photo_url: None,
                nutrition: None,
            },
        }
    }

    #[test]
    fn test_prices_conflict_threshold() {
        assert!(!prices_conflict(4.00, 4.50));
        assert!(prices_conflict(4.00, 4.51));
        // 10% of 20.00 is 2.00
        assert!(!prices_conflict(20.00, 22.00));
        assert!(prices_conflict(22.01, 20.00));
    }

    #[test]
    fn test_merge_items_clusters_across_sources() {
        let rows = vec![
            staged(1, SourceKind::Blog, "snackblog", "Casey's Corner", "Corn Dog Nuggets", Some(11.99)),
            staged(2, SourceKind::Official, "wdw", "Caseys Corner", "Corn Dog Nuggets", Some(12.49)),
            staged(3, SourceKind::Aggregator, "menus", "Casey's Corner", "Foot-long Hot Dog", Some(13.0)),
        ];

        let merged = merge_items(&rows, &MergeThresholds::default());
        assert_eq!(merged.len(), 2);

        let nuggets = &merged[0];
        assert_eq!(nuggets.winning_source, SourceKind::Official);
        assert_eq!(nuggets.restaurant, "Caseys Corner");
        assert_eq!(nuggets.price, Some(12.49));
        assert_eq!(nuggets.sources, vec!["wdw".to_string(), "snackblog".to_string()]);
        assert_eq!(nuggets.staged_ids, vec![2, 1]);
        assert!(nuggets.price_conflict.is_none());
    }

    #[test]
    fn test_merge_items_fills_fields_from_lower_priority() {
        let mut blog = staged(1, SourceKind::Blog, "snackblog", "Sleepy Hollow", "Funnel Cake", None);
        blog.item.description = Some("Powdered sugar".to_string());
        blog.item.photo_url = Some("https://blog.example/cake.jpg".to_string());
        let official = staged(2, SourceKind::Official, "wdw", "Sleepy Hollow", "Funnel Cake", Some(11.0));

        let merged = merge_items(&[blog, official], &MergeThresholds::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].price, Some(11.0));
        assert_eq!(merged[0].description.as_deref(), Some("Powdered sugar"));
        assert_eq!(merged[0].photo_url.as_deref(), Some("https://blog.example/cake.jpg"));
    }

    #[test]
    fn test_merge_items_tie_goes_to_earlier_record() {
        let mut first = staged(1, SourceKind::Blog, "blog-a", "Sleepy Hollow", "Funnel Cake", Some(10.0));
        first.item.description = Some("first".to_string());
        let mut second = staged(2, SourceKind::Blog, "blog-b", "Sleepy Hollow", "Funnel Cake", Some(10.25));
        second.item.description = Some("second".to_string());

        let merged = merge_items(&[first, second], &MergeThresholds::default());
        assert_eq!(merged[0].description.as_deref(), Some("first"));
        assert_eq!(merged[0].price, Some(10.0));
    }

    #[test]
    fn test_merge_items_flags_price_conflict_but_keeps_priority_price() {
        let rows = vec![
            staged(1, SourceKind::Blog, "snackblog", "Pecos Bill", "Fajita Platter", Some(15.99)),
            staged(2, SourceKind::Official, "wdw", "Pecos Bill", "Fajita Platter", Some(18.49)),
        ];

        let merged = merge_items(&rows, &MergeThresholds::default());
        let conflict = merged[0].price_conflict.as_ref().unwrap();
        assert_eq!(conflict.prices.len(), 2);
        assert_eq!(merged[0].price, Some(18.49));
    }

    #[test]
    fn test_merge_items_keeps_parks_apart() {
        let a = staged(1, SourceKind::Official, "wdw", "Cosmic Ray's", "Cheeseburger", Some(12.0));
        let mut b = staged(2, SourceKind::Official, "wdw", "Cosmic Ray's", "Cheeseburger", Some(12.0));
        b.item.park = "Epcot".to_string();

        let merged = merge_items(&[a, b], &MergeThresholds::default());
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].park, "Epcot");
    }

    #[test]
    fn test_merge_items_nutrition_source_tracks_supplier() {
        let mut blog = staged(1, SourceKind::Blog, "snackblog", "Main Street Bakery", "Cinnamon Roll", None);
        blog.item.nutrition = Some(NutritionFacts {
            calories: Some(810.0),
            ..NutritionFacts::default()
        });
        let official = staged(2, SourceKind::Official, "wdw", "Main Street Bakery", "Cinnamon Roll", Some(6.5));

        let merged = merge_items(&[blog, official], &MergeThresholds::default());
        assert_eq!(merged[0].winning_source, SourceKind::Official);
        assert_eq!(merged[0].nutrition_source, Some(SourceKind::Blog));
        assert_eq!(merged[0].nutrition.unwrap().calories, Some(810.0));
    }

    #[test]
    fn test_merge_items_empty_input() {
        assert!(merge_items(&[], &MergeThresholds::default()).is_empty());
    }
}
