//! Catalog persistence: parks, restaurants, menu items, nutrition and allergens.
//!
//! Every named entity is keyed by its normalized name (see
//! [`crate::normalize`]) within its parent, so upserts from differently
//! spelled sources land on the same row.
//!
//! # Example
//!
//! ```ignore
//! use parkmenu_core::catalog::{Catalog, Category, NewMenuItem};
//! use parkmenu_core::Database;
//!
//! let catalog = Catalog::new(Database::new_in_memory().await?);
//! let park = catalog.upsert_park("Magic Kingdom", None, None).await?;
//! let venue = catalog.upsert_restaurant(park.id, "Casey's Corner", Some("Main Street")).await?;
//! let item = catalog.upsert_menu_item(venue.id, &NewMenuItem { /* ... */ }).await?;
//! ```

mod dump;
mod error;
mod model;
mod repository;

pub use dump::{CatalogDump, RestoreSummary};
pub use error::{CatalogError, DbErrorKind};
pub use model::{
    AllergenRecord, AllergenSeverity, AllergenType, CatalogStats, Category,
    KCAL_PER_GRAM_ALCOHOL, KCAL_PER_GRAM_FAT, KCAL_PER_GRAM_PROTEIN_CARB, MenuItem, NewMenuItem,
    NutrientField, NutritionFacts, NutritionRecord, NutritionSource, Park, Restaurant,
};
pub use repository::CatalogRepository;

use std::collections::HashMap;

use sqlx::FromRow;
use tracing::{debug, instrument};

use crate::db::Database;
use crate::normalize::normalize_name;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Returns `Ok(())` if at least one row was affected; otherwise [`CatalogError::NotFound`].
fn check_affected(entity: &'static str, id: i64, rows_affected: u64) -> Result<()> {
    if rows_affected == 0 {
        Err(CatalogError::not_found(entity, id))
    } else {
        Ok(())
    }
}

fn name_key(entity: &'static str, name: &str) -> Result<String> {
    let key = normalize_name(name);
    if key.is_empty() {
        return Err(CatalogError::EmptyName {
            entity,
            name: name.to_string(),
        });
    }
    Ok(key)
}

/// Partial update for an existing menu item; `None` leaves a column unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct MenuItemUpdate<'a> {
    pub description: Option<&'a str>,
    pub price: Option<f64>,
    pub photo_url: Option<&'a str>,
}

impl MenuItemUpdate<'_> {
    /// Returns `true` when nothing would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.description.is_none() && self.price.is_none() && self.photo_url.is_none()
    }
}

/// One applied audit correction, as written to `audit_log`.
#[derive(Debug, Clone, Copy)]
pub struct NewAuditLogEntry<'a> {
    pub menu_item_id: i64,
    pub rule: &'a str,
    /// Column that changed, e.g. `sugar` or `confidence_score`.
    pub field: &'a str,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
}

/// A stored audit correction.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct AuditLogRecord {
    pub id: i64,
    pub menu_item_id: i64,
    pub rule: String,
    pub field: String,
    pub old_value: Option<f64>,
    pub new_value: Option<f64>,
    pub applied_at: String,
}

/// Catalog access backed by `SQLite`.
#[derive(Debug, Clone)]
pub struct Catalog {
    db: Database,
}

impl Catalog {
    /// Creates a catalog over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the underlying database handle.
    #[must_use]
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ==================== Parks ====================

    /// Inserts a park or returns the existing one with the same normalized name.
    ///
    /// Location and timezone fill in blanks on an existing park but never erase values.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for unmatchable names, or
    /// [`CatalogError::Database`] if the upsert fails.
    #[instrument(skip(self))]
    pub async fn upsert_park(
        &self,
        name: &str,
        location: Option<&str>,
        timezone: Option<&str>,
    ) -> Result<Park> {
        let key = name_key("park", name)?;
        let park = sqlx::query_as::<_, Park>(
            r"INSERT INTO parks (name, location, timezone, name_key)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(name_key) DO UPDATE SET
                  location = COALESCE(excluded.location, parks.location),
                  timezone = COALESCE(excluded.timezone, parks.timezone)
              RETURNING id, name, location, timezone, name_key",
        )
        .bind(name.trim())
        .bind(location)
        .bind(timezone)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(park)
    }

    /// Looks up a park by name (normalized).
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn find_park(&self, name: &str) -> Result<Option<Park>> {
        let park = sqlx::query_as::<_, Park>("SELECT * FROM parks WHERE name_key = ?")
            .bind(normalize_name(name))
            .fetch_optional(self.db.pool())
            .await?;
        Ok(park)
    }

    /// Lists all parks ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_parks(&self) -> Result<Vec<Park>> {
        let parks = sqlx::query_as::<_, Park>("SELECT * FROM parks ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(parks)
    }

    // ==================== Restaurants ====================

    /// Inserts a restaurant or returns the existing one with the same normalized name in the park.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for unmatchable names, or
    /// [`CatalogError::Database`] if the upsert fails (including unknown `park_id`).
    #[instrument(skip(self))]
    pub async fn upsert_restaurant(
        &self,
        park_id: i64,
        name: &str,
        land: Option<&str>,
    ) -> Result<Restaurant> {
        let key = name_key("restaurant", name)?;
        let restaurant = sqlx::query_as::<_, Restaurant>(
            r"INSERT INTO restaurants (park_id, name, land, name_key)
              VALUES (?, ?, ?, ?)
              ON CONFLICT(park_id, name_key) DO UPDATE SET
                  land = COALESCE(restaurants.land, excluded.land)
              RETURNING id, park_id, name, land, name_key",
        )
        .bind(park_id)
        .bind(name.trim())
        .bind(land)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(restaurant)
    }

    /// Gets a restaurant by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn get_restaurant(&self, id: i64) -> Result<Option<Restaurant>> {
        let restaurant = sqlx::query_as::<_, Restaurant>("SELECT * FROM restaurants WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(restaurant)
    }

    /// Lists a park's restaurants ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn restaurants_for_park(&self, park_id: i64) -> Result<Vec<Restaurant>> {
        let restaurants = sqlx::query_as::<_, Restaurant>(
            "SELECT * FROM restaurants WHERE park_id = ? ORDER BY id",
        )
        .bind(park_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(restaurants)
    }

    // ==================== Menu items ====================

    /// Inserts a menu item or returns the existing one with the same normalized name at the restaurant.
    ///
    /// An existing row is returned unchanged; use [`Catalog::update_menu_item`] to change it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for unmatchable names, or
    /// [`CatalogError::Database`] if the upsert fails.
    #[instrument(skip(self, item), fields(name = %item.name))]
    pub async fn upsert_menu_item(
        &self,
        restaurant_id: i64,
        item: &NewMenuItem<'_>,
    ) -> Result<MenuItem> {
        let key = name_key("menu item", item.name)?;
        let row = sqlx::query_as::<_, MenuItem>(
            r"INSERT INTO menu_items (
                restaurant_id, name, description, price, photo_url,
                category, is_fried, is_vegetarian, name_key
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(restaurant_id, name_key) DO UPDATE SET
                  updated_at = menu_items.updated_at
              RETURNING *",
        )
        .bind(restaurant_id)
        .bind(item.name.trim())
        .bind(item.description)
        .bind(item.price)
        .bind(item.photo_url)
        .bind(item.category.as_str())
        .bind(item.is_fried)
        .bind(item.is_vegetarian)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;

        Ok(row)
    }

    /// Applies a partial update to a menu item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no item has this id.
    #[instrument(skip(self, update))]
    pub async fn update_menu_item(&self, id: i64, update: &MenuItemUpdate<'_>) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE menu_items
              SET description = COALESCE(?, description),
                  price = COALESCE(?, price),
                  photo_url = COALESCE(?, photo_url),
                  updated_at = datetime('now')
              WHERE id = ?",
        )
        .bind(update.description)
        .bind(update.price)
        .bind(update.photo_url)
        .bind(id)
        .execute(self.db.pool())
        .await?;

        check_affected("menu item", id, result.rows_affected())
    }

    /// Gets a menu item by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn get_menu_item(&self, id: i64) -> Result<Option<MenuItem>> {
        let item = sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(item)
    }

    /// Lists a restaurant's menu items ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn items_for_restaurant(&self, restaurant_id: i64) -> Result<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            "SELECT * FROM menu_items WHERE restaurant_id = ? ORDER BY id",
        )
        .bind(restaurant_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }

    /// Lists every menu item ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_menu_items(&self) -> Result<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>("SELECT * FROM menu_items ORDER BY id")
            .fetch_all(self.db.pool())
            .await?;
        Ok(items)
    }

    /// Lists menu items that have no nutrition row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn items_missing_nutrition(&self) -> Result<Vec<MenuItem>> {
        let items = sqlx::query_as::<_, MenuItem>(
            r"SELECT m.* FROM menu_items m
              LEFT JOIN nutritional_data n ON n.menu_item_id = m.id
              WHERE n.menu_item_id IS NULL
              ORDER BY m.id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(items)
    }

    /// Lists menu items paired with their nutrition rows, ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if a query fails.
    pub async fn items_with_nutrition(&self) -> Result<Vec<(MenuItem, NutritionRecord)>> {
        let mut nutrition: HashMap<i64, NutritionRecord> = self
            .list_nutrition()
            .await?
            .into_iter()
            .map(|record| (record.menu_item_id, record))
            .collect();

        let items = self.list_menu_items().await?;
        Ok(items
            .into_iter()
            .filter_map(|item| nutrition.remove(&item.id).map(|record| (item, record)))
            .collect())
    }

    // ==================== Nutrition ====================

    /// Inserts or replaces the nutrition row for a menu item.
    ///
    /// Values are stored as given; callers that need the write-time invariants
    /// call [`NutritionFacts::validate`] first.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the write fails (including unknown item id).
    #[instrument(skip(self, facts), fields(source = %source, confidence))]
    pub async fn upsert_nutrition(
        &self,
        menu_item_id: i64,
        facts: &NutritionFacts,
        source: NutritionSource,
        confidence: i64,
    ) -> Result<()> {
        sqlx::query(
            r"INSERT INTO nutritional_data (
                menu_item_id, calories, carbs, fat, protein, sugar, fiber,
                sodium, cholesterol, alcohol_grams, source, confidence_score
              )
              VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
              ON CONFLICT(menu_item_id) DO UPDATE SET
                  calories = excluded.calories,
                  carbs = excluded.carbs,
                  fat = excluded.fat,
                  protein = excluded.protein,
                  sugar = excluded.sugar,
                  fiber = excluded.fiber,
                  sodium = excluded.sodium,
                  cholesterol = excluded.cholesterol,
                  alcohol_grams = excluded.alcohol_grams,
                  source = excluded.source,
                  confidence_score = excluded.confidence_score,
                  updated_at = datetime('now')",
        )
        .bind(menu_item_id)
        .bind(facts.calories)
        .bind(facts.carbs)
        .bind(facts.fat)
        .bind(facts.protein)
        .bind(facts.sugar)
        .bind(facts.fiber)
        .bind(facts.sodium)
        .bind(facts.cholesterol)
        .bind(facts.alcohol_grams)
        .bind(source.as_str())
        .bind(confidence)
        .execute(self.db.pool())
        .await?;

        debug!(menu_item_id, "nutrition stored");
        Ok(())
    }

    /// Gets the nutrition row for a menu item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn get_nutrition(&self, menu_item_id: i64) -> Result<Option<NutritionRecord>> {
        let record = sqlx::query_as::<_, NutritionRecord>(
            "SELECT * FROM nutritional_data WHERE menu_item_id = ?",
        )
        .bind(menu_item_id)
        .fetch_optional(self.db.pool())
        .await?;
        Ok(record)
    }

    /// Lists every nutrition row ordered by item id.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_nutrition(&self) -> Result<Vec<NutritionRecord>> {
        let records = sqlx::query_as::<_, NutritionRecord>(
            "SELECT * FROM nutritional_data ORDER BY menu_item_id",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Sets a single nutrient column.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the item has no nutrition row.
    #[instrument(skip(self), fields(field = %field))]
    pub async fn update_nutrition_field(
        &self,
        menu_item_id: i64,
        field: NutrientField,
        value: Option<f64>,
    ) -> Result<()> {
        // Column name comes from a closed enum, never from input.
        let sql = format!(
            "UPDATE nutritional_data SET {} = ?, updated_at = datetime('now') WHERE menu_item_id = ?",
            field.column()
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .bind(menu_item_id)
            .execute(self.db.pool())
            .await?;

        check_affected("nutrition record", menu_item_id, result.rows_affected())
    }

    /// Sets the confidence score of a nutrition row.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if the item has no nutrition row.
    pub async fn set_confidence(&self, menu_item_id: i64, confidence: i64) -> Result<()> {
        let result = sqlx::query(
            r"UPDATE nutritional_data
              SET confidence_score = ?, updated_at = datetime('now')
              WHERE menu_item_id = ?",
        )
        .bind(confidence)
        .bind(menu_item_id)
        .execute(self.db.pool())
        .await?;

        check_affected("nutrition record", menu_item_id, result.rows_affected())
    }

    // ==================== Allergens ====================

    /// Replaces all allergen edges of a menu item in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the transaction fails.
    #[instrument(skip(self, edges), fields(count = edges.len()))]
    pub async fn set_allergens(
        &self,
        menu_item_id: i64,
        edges: &[(AllergenType, AllergenSeverity)],
    ) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;

        sqlx::query("DELETE FROM allergens WHERE menu_item_id = ?")
            .bind(menu_item_id)
            .execute(&mut *tx)
            .await?;

        for (allergen, severity) in edges {
            sqlx::query(
                r"INSERT INTO allergens (menu_item_id, allergen_type, severity)
                  VALUES (?, ?, ?)
                  ON CONFLICT(menu_item_id, allergen_type) DO UPDATE SET severity = excluded.severity",
            )
            .bind(menu_item_id)
            .bind(allergen.as_str())
            .bind(severity.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Lists the allergen edges of a menu item ordered by type.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn allergens_for(&self, menu_item_id: i64) -> Result<Vec<AllergenRecord>> {
        let records = sqlx::query_as::<_, AllergenRecord>(
            "SELECT * FROM allergens WHERE menu_item_id = ? ORDER BY allergen_type",
        )
        .bind(menu_item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    /// Lists every allergen edge.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn list_allergens(&self) -> Result<Vec<AllergenRecord>> {
        let records = sqlx::query_as::<_, AllergenRecord>(
            "SELECT * FROM allergens ORDER BY menu_item_id, allergen_type",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    // ==================== Audit trail ====================

    /// Appends one applied correction to `audit_log`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the insert fails.
    pub async fn record_audit_fix(&self, entry: &NewAuditLogEntry<'_>) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r"INSERT INTO audit_log (menu_item_id, rule, field, old_value, new_value)
              VALUES (?, ?, ?, ?, ?)
              RETURNING id",
        )
        .bind(entry.menu_item_id)
        .bind(entry.rule)
        .bind(entry.field)
        .bind(entry.old_value)
        .bind(entry.new_value)
        .fetch_one(self.db.pool())
        .await?;
        Ok(id)
    }

    /// Lists audit corrections, newest first, optionally for one item.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if the query fails.
    pub async fn audit_log(&self, menu_item_id: Option<i64>) -> Result<Vec<AuditLogRecord>> {
        let records = sqlx::query_as::<_, AuditLogRecord>(
            r"SELECT * FROM audit_log
              WHERE (?1 IS NULL OR menu_item_id = ?1)
              ORDER BY id DESC",
        )
        .bind(menu_item_id)
        .fetch_all(self.db.pool())
        .await?;
        Ok(records)
    }

    // ==================== Raw restore ====================

    /// Writes a park row from a dump and returns its local id.
    ///
    /// A local park with the same name key absorbs the row. Otherwise the
    /// row keeps its given id unless another park already holds it.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for a blank name and
    /// [`CatalogError::Database`] if the write fails.
    pub async fn restore_park(&self, park: &Park) -> Result<i64> {
        let key = name_key("park", &park.name)?;
        let (id,): (i64,) = sqlx::query_as(
            r"INSERT INTO parks (id, name, location, timezone, name_key)
              VALUES ((SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM parks WHERE id = ?1)), ?2, ?3, ?4, ?5)
              ON CONFLICT(name_key) DO UPDATE SET
                  name = excluded.name,
                  location = excluded.location,
                  timezone = excluded.timezone
              RETURNING id",
        )
        .bind(park.id)
        .bind(&park.name)
        .bind(&park.location)
        .bind(&park.timezone)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;
        Ok(id)
    }

    /// Writes a restaurant row from a dump and returns its local id.
    ///
    /// `park_id` must already be local. Matching follows
    /// [`Catalog::restore_park`] within the park.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for a blank name and
    /// [`CatalogError::Database`] if the write fails.
    pub async fn restore_restaurant(&self, restaurant: &Restaurant) -> Result<i64> {
        let key = name_key("restaurant", &restaurant.name)?;
        let (id,): (i64,) = sqlx::query_as(
            r"INSERT INTO restaurants (id, park_id, name, land, name_key)
              VALUES ((SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM restaurants WHERE id = ?1)), ?2, ?3, ?4, ?5)
              ON CONFLICT(park_id, name_key) DO UPDATE SET
                  name = excluded.name,
                  land = excluded.land
              RETURNING id",
        )
        .bind(restaurant.id)
        .bind(restaurant.park_id)
        .bind(&restaurant.name)
        .bind(&restaurant.land)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;
        Ok(id)
    }

    /// Writes a menu item row from a dump and returns its local id.
    ///
    /// `restaurant_id` must already be local. Matching follows
    /// [`Catalog::restore_park`] within the restaurant.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::EmptyName`] for a blank name and
    /// [`CatalogError::Database`] if the write fails.
    pub async fn restore_menu_item(&self, item: &MenuItem) -> Result<i64> {
        let key = name_key("menu item", &item.name)?;
        let (id,): (i64,) = sqlx::query_as(
            r"INSERT INTO menu_items (
                id, restaurant_id, name, description, price, photo_url,
                category, is_fried, is_vegetarian, name_key
              )
              VALUES (
                (SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM menu_items WHERE id = ?1)),
                ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10
              )
              ON CONFLICT(restaurant_id, name_key) DO UPDATE SET
                  name = excluded.name,
                  description = excluded.description,
                  price = excluded.price,
                  photo_url = excluded.photo_url,
                  category = excluded.category,
                  is_fried = excluded.is_fried,
                  is_vegetarian = excluded.is_vegetarian,
                  updated_at = datetime('now')
              RETURNING id",
        )
        .bind(item.id)
        .bind(item.restaurant_id)
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(&item.photo_url)
        .bind(item.category().as_str())
        .bind(item.is_fried)
        .bind(item.is_vegetarian)
        .bind(key)
        .fetch_one(self.db.pool())
        .await?;
        Ok(id)
    }

    // ==================== Stats ====================

    /// Counts rows per entity and nutrition rows per source.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Database`] if a query fails.
    pub async fn stats(&self) -> Result<CatalogStats> {
        let pool = self.db.pool();
        let (parks,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parks")
            .fetch_one(pool)
            .await?;
        let (restaurants,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM restaurants")
            .fetch_one(pool)
            .await?;
        let (menu_items,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM menu_items")
            .fetch_one(pool)
            .await?;
        let (with_nutrition,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM nutritional_data")
            .fetch_one(pool)
            .await?;
        let (allergen_edges,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM allergens")
            .fetch_one(pool)
            .await?;
        let by_source: Vec<(String, i64)> = sqlx::query_as(
            "SELECT source, COUNT(*) FROM nutritional_data GROUP BY source ORDER BY source",
        )
        .fetch_all(pool)
        .await?;

        Ok(CatalogStats {
            parks,
            restaurants,
            menu_items,
            with_nutrition,
            allergen_edges,
            by_source,
        })
    }
}
