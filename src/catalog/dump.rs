//! Whole-catalog snapshots, as loaded from a JSON dump or pulled from the
//! hosted catalog.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::{
    AllergenRecord, AllergenSeverity, AllergenType, Catalog, CatalogError, MenuItem, NutritionRecord, Park,
    Restaurant,
};

/// Rows of every catalog table. Missing tables decode as empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDump {
    #[serde(default)]
    pub parks: Vec<Park>,
    #[serde(default)]
    pub restaurants: Vec<Restaurant>,
    #[serde(default)]
    pub menu_items: Vec<MenuItem>,
    #[serde(default, alias = "nutritional_data")]
    pub nutrition: Vec<NutritionRecord>,
    #[serde(default)]
    pub allergens: Vec<AllergenRecord>,
}

/// Rows stored by [`Catalog::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RestoreSummary {
    pub parks: usize,
    pub restaurants: usize,
    pub menu_items: usize,
    pub nutrition: usize,
    pub allergens: usize,
    /// Rows that could not be stored.
    pub failed: usize,
}

impl RestoreSummary {
    /// Rows stored across all tables.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.parks + self.restaurants + self.menu_items + self.nutrition + self.allergens
    }
}

/// Dump ids mapped to the local ids their rows landed on.
///
/// `None` marks a row that was not stored. Ids absent from the dump pass
/// through unchanged so rows may point at parents already in the catalog.
#[derive(Debug, Default)]
struct IdMap(HashMap<i64, Option<i64>>);

impl IdMap {
    fn record(&mut self, dump_id: i64, local_id: Option<i64>) {
        self.0.insert(dump_id, local_id);
    }

    fn local(&self, dump_id: i64) -> Option<i64> {
        self.0.get(&dump_id).copied().unwrap_or(Some(dump_id))
    }
}

impl Catalog {
    /// Stores a snapshot, keeping its values as given.
    ///
    /// Rows are matched to local rows by natural key (park name, restaurant
    /// name within its park, item name within its restaurant) and child
    /// foreign keys are rewritten to the matched ids. Unmatched rows keep
    /// their dump id when it is free. Parents are written before children.
    /// A row that cannot be stored, such as an item whose restaurant is
    /// missing, is logged and counted as failed; the rest still load.
    #[instrument(skip(self, dump), fields(
        parks = dump.parks.len(),
        menu_items = dump.menu_items.len(),
        nutrition = dump.nutrition.len(),
    ))]
    pub async fn restore(&self, dump: &CatalogDump) -> RestoreSummary {
        let mut summary = RestoreSummary::default();
        let mut park_ids = IdMap::default();
        let mut restaurant_ids = IdMap::default();
        let mut item_ids = IdMap::default();

        for park in &dump.parks {
            match self.restore_park(park).await {
                Ok(local) => {
                    park_ids.record(park.id, Some(local));
                    summary.parks += 1;
                }
                Err(error) => {
                    warn!(id = park.id, error = %error, "park not stored");
                    park_ids.record(park.id, None);
                    summary.failed += 1;
                }
            }
        }

        for restaurant in &dump.restaurants {
            let stored = match park_ids.local(restaurant.park_id) {
                Some(park_id) => {
                    let row = Restaurant {
                        park_id,
                        ..restaurant.clone()
                    };
                    self.restore_restaurant(&row).await
                }
                None => Err(CatalogError::not_found("park", restaurant.park_id)),
            };
            match stored {
                Ok(local) => {
                    restaurant_ids.record(restaurant.id, Some(local));
                    summary.restaurants += 1;
                }
                Err(error) => {
                    warn!(id = restaurant.id, error = %error, "restaurant not stored");
                    restaurant_ids.record(restaurant.id, None);
                    summary.failed += 1;
                }
            }
        }

        for item in &dump.menu_items {
            let stored = match restaurant_ids.local(item.restaurant_id) {
                Some(restaurant_id) => {
                    let row = MenuItem {
                        restaurant_id,
                        ..item.clone()
                    };
                    self.restore_menu_item(&row).await
                }
                None => Err(CatalogError::not_found("restaurant", item.restaurant_id)),
            };
            match stored {
                Ok(local) => {
                    item_ids.record(item.id, Some(local));
                    summary.menu_items += 1;
                }
                Err(error) => {
                    warn!(id = item.id, error = %error, "menu item not stored");
                    item_ids.record(item.id, None);
                    summary.failed += 1;
                }
            }
        }

        for record in &dump.nutrition {
            let stored = match item_ids.local(record.menu_item_id) {
                Some(menu_item_id) => {
                    self.upsert_nutrition(
                        menu_item_id,
                        &record.facts(),
                        record.source(),
                        record.confidence_score,
                    )
                    .await
                }
                None => Err(CatalogError::not_found("menu item", record.menu_item_id)),
            };
            match stored {
                Ok(()) => summary.nutrition += 1,
                Err(error) => {
                    warn!(menu_item_id = record.menu_item_id, error = %error, "nutrition not stored");
                    summary.failed += 1;
                }
            }
        }

        let mut edges: BTreeMap<i64, Vec<(AllergenType, AllergenSeverity)>> = BTreeMap::new();
        for record in &dump.allergens {
            let Some(menu_item_id) = item_ids.local(record.menu_item_id) else {
                warn!(menu_item_id = record.menu_item_id, "allergen edge for unstored item skipped");
                summary.failed += 1;
                continue;
            };
            if let (Some(allergen), Some(severity)) = (record.allergen_type(), record.severity()) {
                edges
                    .entry(menu_item_id)
                    .or_default()
                    .push((allergen, severity));
            } else {
                warn!(
                    menu_item_id = record.menu_item_id,
                    allergen = %record.allergen_type_str,
                    severity = %record.severity_str,
                    "unknown allergen edge skipped"
                );
                summary.failed += 1;
            }
        }
        for (menu_item_id, item_edges) in edges {
            match self.set_allergens(menu_item_id, &item_edges).await {
                Ok(()) => summary.allergens += item_edges.len(),
                Err(error) => {
                    warn!(menu_item_id, error = %error, "allergens not stored");
                    summary.failed += item_edges.len();
                }
            }
        }

        info!(
            parks = summary.parks,
            restaurants = summary.restaurants,
            menu_items = summary.menu_items,
            nutrition = summary.nutrition,
            allergens = summary.allergens,
            failed = summary.failed,
            "catalog snapshot restored"
        );
        summary
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::catalog::NutritionSource;

    const DUMP: &str = r#"{
        "parks": [{"id": 10, "name": "EPCOT", "location": "Orlando, FL", "timezone": null}],
        "restaurants": [
            {"id": 20, "park_id": 10, "name": "Sunshine Seasons", "land": "World Nature"},
            {"id": 21, "park_id": 99, "name": "Orphan Grill", "land": null}
        ],
        "menu_items": [
            {"id": 30, "restaurant_id": 20, "name": "Rotisserie Chicken", "description": null,
             "price": 14.99, "photo_url": null, "category": "entree",
             "is_fried": false, "is_vegetarian": false}
        ],
        "nutritional_data": [
            {"menu_item_id": 30, "calories": 640, "carbs": -4, "fat": 30, "protein": 60,
             "sugar": null, "fiber": null, "sodium": 1200, "cholesterol": null,
             "alcohol_grams": null, "source": "official", "confidence_score": 140}
        ],
        "allergens": [
            {"menu_item_id": 30, "allergen_type": "milk", "severity": "may_contain"},
            {"menu_item_id": 30, "allergen_type": "gluten", "severity": "contains"}
        ]
    }"#;

    #[tokio::test]
    async fn test_restore_keeps_ids_and_raw_values() {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let dump: CatalogDump = serde_json::from_str(DUMP).unwrap();

        let summary = catalog.restore(&dump).await;
        assert_eq!(summary.parks, 1);
        assert_eq!(summary.restaurants, 1);
        assert_eq!(summary.menu_items, 1);
        assert_eq!(summary.nutrition, 1);
        assert_eq!(summary.allergens, 1);
        assert_eq!(summary.stored(), 5);
        // Orphaned restaurant and unknown allergen.
        assert_eq!(summary.failed, 2);

        let item = catalog.get_menu_item(30).await.unwrap().unwrap();
        assert_eq!(item.name_key, "rotisserie chicken");
        let record = catalog.get_nutrition(30).await.unwrap().unwrap();
        assert_eq!(record.carbs, Some(-4.0));
        assert_eq!(record.confidence_score, 140);
        assert_eq!(record.source(), NutritionSource::Official);
    }

    #[test]
    fn test_dump_missing_tables_are_empty() {
        let dump: CatalogDump = serde_json::from_str(r#"{"parks": []}"#).unwrap();
        assert!(dump.menu_items.is_empty());
        assert!(dump.nutrition.is_empty());
    }
}
