//! Repository seam for nutrition reads and writes.
//!
//! The audit, estimator and review flows only need this slice of the catalog,
//! so they take `&dyn CatalogRepository` rather than a concrete [`Catalog`].

use async_trait::async_trait;

use super::{
    Catalog, MenuItem, NewAuditLogEntry, NutrientField, NutritionFacts, NutritionRecord,
    NutritionSource, Result,
};

/// Data-access contract for nutrition-centric pipeline stages.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Returns every menu item ordered by id.
    async fn list_menu_items(&self) -> Result<Vec<MenuItem>>;

    /// Returns every nutrition row ordered by item id.
    async fn list_nutrition(&self) -> Result<Vec<NutritionRecord>>;

    /// Returns one item's nutrition row.
    async fn get_nutrition(&self, menu_item_id: i64) -> Result<Option<NutritionRecord>>;

    /// Inserts or replaces one item's nutrition row.
    async fn upsert_nutrition(
        &self,
        menu_item_id: i64,
        facts: &NutritionFacts,
        source: NutritionSource,
        confidence: i64,
    ) -> Result<()>;

    /// Sets one nutrient column.
    async fn update_nutrition_field(
        &self,
        menu_item_id: i64,
        field: NutrientField,
        value: Option<f64>,
    ) -> Result<()>;

    /// Sets the confidence score of a nutrition row.
    async fn set_confidence(&self, menu_item_id: i64, confidence: i64) -> Result<()>;

    /// Appends an applied correction to the audit trail.
    async fn record_audit_fix(&self, entry: &NewAuditLogEntry<'_>) -> Result<i64>;
}

#[async_trait]
impl CatalogRepository for Catalog {
    async fn list_menu_items(&self) -> Result<Vec<MenuItem>> {
        Catalog::list_menu_items(self).await
    }

    async fn list_nutrition(&self) -> Result<Vec<NutritionRecord>> {
        Catalog::list_nutrition(self).await
    }

    async fn get_nutrition(&self, menu_item_id: i64) -> Result<Option<NutritionRecord>> {
        Catalog::get_nutrition(self, menu_item_id).await
    }

    async fn upsert_nutrition(
        &self,
        menu_item_id: i64,
        facts: &NutritionFacts,
        source: NutritionSource,
        confidence: i64,
    ) -> Result<()> {
        Catalog::upsert_nutrition(self, menu_item_id, facts, source, confidence).await
    }

    async fn update_nutrition_field(
        &self,
        menu_item_id: i64,
        field: NutrientField,
        value: Option<f64>,
    ) -> Result<()> {
        Catalog::update_nutrition_field(self, menu_item_id, field, value).await
    }

    async fn set_confidence(&self, menu_item_id: i64, confidence: i64) -> Result<()> {
        Catalog::set_confidence(self, menu_item_id, confidence).await
    }

    async fn record_audit_fix(&self, entry: &NewAuditLogEntry<'_>) -> Result<i64> {
        Catalog::record_audit_fix(self, entry).await
    }
}
