//! Writes merged items into the catalog.

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{MergeThresholds, MergedItem};
use crate::allergens::detect_allergens;
use crate::catalog::{Catalog, CatalogError, MenuItemUpdate, NewMenuItem, NutritionSource};
use crate::classify::classify;
use crate::matching::best_match;
use crate::scrape::SourceKind;

/// Confidence assigned to nutrition published by the park operator.
pub const OFFICIAL_CONFIDENCE: i64 = 95;

/// Confidence assigned to nutrition scraped from any other site.
pub const CROWDSOURCED_CONFIDENCE: i64 = 60;

/// Counts from one [`import_merged`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub parks_created: usize,
    pub restaurants_created: usize,
    pub items_created: usize,
    pub items_updated: usize,
    pub nutrition_written: usize,
    pub price_conflicts: usize,
    /// Items that failed to import and were skipped.
    pub failed: usize,
    /// Staging ids of every item that imported cleanly.
    #[serde(skip)]
    pub merged_ids: Vec<i64>,
}

/// Imports merged items: match or create park, restaurant and item, then
/// fill gaps and write nutrition.
///
/// A failure on one item is logged and counted; the rest still import.
///
/// # Errors
///
/// Currently never fails as a whole; the `Result` leaves room for
/// transaction-level failures.
#[instrument(skip(catalog, merged), fields(items = merged.len()))]
pub async fn import_merged(
    catalog: &Catalog,
    merged: &[MergedItem],
    thresholds: &MergeThresholds,
) -> Result<ImportSummary, CatalogError> {
    let mut summary = ImportSummary::default();

    for item in merged {
        match import_one(catalog, item, thresholds, &mut summary).await {
            Ok(()) => {
                summary.merged_ids.extend(&item.staged_ids);
                if item.price_conflict.is_some() {
                    summary.price_conflicts += 1;
                }
            }
            Err(error) => {
                warn!(item = %item.name, restaurant = %item.restaurant, error = %error, "import failed, skipping item");
                summary.failed += 1;
            }
        }
    }

    info!(
        parks_created = summary.parks_created,
        restaurants_created = summary.restaurants_created,
        items_created = summary.items_created,
        items_updated = summary.items_updated,
        nutrition_written = summary.nutrition_written,
        price_conflicts = summary.price_conflicts,
        failed = summary.failed,
        "merged items imported"
    );
    Ok(summary)
}

async fn import_one(
    catalog: &Catalog,
    item: &MergedItem,
    thresholds: &MergeThresholds,
    summary: &mut ImportSummary,
) -> Result<(), CatalogError> {
    let park = match catalog.find_park(&item.park).await? {
        Some(park) => park,
        None => {
            summary.parks_created += 1;
            catalog.upsert_park(&item.park, None, None).await?
        }
    };

    let venues = catalog.restaurants_for_park(park.id).await?;
    let venue_names: Vec<&str> = venues.iter().map(|v| v.name.as_str()).collect();
    let restaurant = match best_match(&item.restaurant, &venue_names, thresholds.restaurant) {
        Some(found) if venues[found.index].land.is_some() || item.land.is_none() => {
            venues[found.index].clone()
        }
        Some(found) => {
            // Existing venue without a land; fill it in.
            let name = venues[found.index].name.clone();
            catalog
                .upsert_restaurant(park.id, &name, item.land.as_deref())
                .await?
        }
        None => {
            summary.restaurants_created += 1;
            catalog
                .upsert_restaurant(park.id, &item.restaurant, item.land.as_deref())
                .await?
        }
    };

    let existing = catalog.items_for_restaurant(restaurant.id).await?;
    let existing_names: Vec<&str> = existing.iter().map(|m| m.name.as_str()).collect();
    let menu_item = match best_match(&item.name, &existing_names, thresholds.item) {
        Some(found) => {
            let current = &existing[found.index];
            let price_wins = item.winning_source == SourceKind::Official || current.price.is_none();
            let update = MenuItemUpdate {
                description: item
                    .description
                    .as_deref()
                    .filter(|_| current.description.is_none()),
                price: item
                    .price
                    .filter(|price| price_wins && current.price != Some(*price)),
                photo_url: item
                    .photo_url
                    .as_deref()
                    .filter(|_| current.photo_url.is_none()),
            };
            if !update.is_empty() {
                catalog.update_menu_item(current.id, &update).await?;
                summary.items_updated += 1;
            }
            current.clone()
        }
        None => {
            let traits = classify(&item.name, item.description.as_deref());
            let created = catalog
                .upsert_menu_item(
                    restaurant.id,
                    &NewMenuItem {
                        name: &item.name,
                        description: item.description.as_deref(),
                        price: item.price,
                        photo_url: item.photo_url.as_deref(),
                        category: traits.category,
                        is_fried: traits.is_fried,
                        is_vegetarian: traits.is_vegetarian,
                    },
                )
                .await?;
            let allergens = detect_allergens(&item.name, item.description.as_deref());
            if !allergens.is_empty() {
                catalog.set_allergens(created.id, &allergens).await?;
            }
            summary.items_created += 1;
            created
        }
    };

    if let Some(facts) = item.nutrition.filter(|facts| !facts.is_empty()) {
        let (source, confidence) = if item.nutrition_source == Some(SourceKind::Official) {
            (NutritionSource::Official, OFFICIAL_CONFIDENCE)
        } else {
            (NutritionSource::Crowdsourced, CROWDSOURCED_CONFIDENCE)
        };
        let current = catalog.get_nutrition(menu_item.id).await?;
        if current.is_none_or(|record| record.confidence_score <= confidence) {
            catalog
                .upsert_nutrition(menu_item.id, &facts, source, confidence)
                .await?;
            summary.nutrition_written += 1;
        } else {
            debug!(menu_item_id = menu_item.id, "existing nutrition has higher confidence, kept");
        }
    }

    Ok(())
}
