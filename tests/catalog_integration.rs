//! Integration tests for the catalog against a file-backed SQLite database.

use parkmenu_core::Database;
use parkmenu_core::catalog::{
    AllergenSeverity, AllergenType, Catalog, CatalogDump, CatalogError, Category, MenuItemUpdate,
    NutritionSource,
};

mod support;
use support::fixtures::{add_item, facts, setup_test_db};

#[tokio::test]
async fn test_catalog_persists_across_reopen() {
    let (db, temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);
    let item = add_item(
        &catalog,
        "Cosmic Ray's Starlight Cafe",
        "Bacon Cheeseburger",
        Category::Entree,
        Some((facts(1010.0, 60.0, 58.0, 52.0), NutritionSource::Official, 95)),
    )
    .await;
    catalog.db().clone().close().await;

    let reopened = Catalog::new(
        Database::new(&temp_dir.path().join("catalog.db"))
            .await
            .expect("reopen should succeed"),
    );
    let stored = reopened.get_menu_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Bacon Cheeseburger");
    let record = reopened.get_nutrition(item.id).await.unwrap().unwrap();
    assert_eq!(record.confidence_score, 95);
    assert_eq!(record.source(), NutritionSource::Official);
}

#[tokio::test]
async fn test_names_match_across_spellings() {
    let (db, _temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);

    let first = add_item(&catalog, "Casey's Corner", "Corn Dog Nuggets", Category::Snack, None).await;
    let second = add_item(&catalog, "CASEYS CORNER", "corn-dog nuggets", Category::Snack, None).await;

    assert_eq!(first.id, second.id);
    assert_eq!(first.restaurant_id, second.restaurant_id);
    assert_eq!(catalog.list_parks().await.unwrap().len(), 1);
    assert_eq!(catalog.list_menu_items().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_fills_without_erasing() {
    let (db, _temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);
    let item = add_item(&catalog, "Pecos Bill", "Fajita Platter", Category::Entree, None).await;

    catalog
        .update_menu_item(
            item.id,
            &MenuItemUpdate {
                description: Some("Chicken or beef with peppers"),
                price: Some(15.49),
                photo_url: None,
            },
        )
        .await
        .unwrap();
    catalog
        .update_menu_item(
            item.id,
            &MenuItemUpdate {
                price: Some(15.99),
                ..MenuItemUpdate::default()
            },
        )
        .await
        .unwrap();

    let stored = catalog.get_menu_item(item.id).await.unwrap().unwrap();
    assert_eq!(stored.description.as_deref(), Some("Chicken or beef with peppers"));
    assert_eq!(stored.price, Some(15.99));

    let err = catalog
        .update_menu_item(9999, &MenuItemUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::NotFound { .. }));
}

#[tokio::test]
async fn test_allergens_replace_and_stats() {
    let (db, _temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);
    let item = add_item(
        &catalog,
        "Sleepy Hollow",
        "Funnel Cake",
        Category::Dessert,
        Some((facts(720.0, 90.0, 34.0, 9.0), NutritionSource::Crowdsourced, 60)),
    )
    .await;
    add_item(&catalog, "Sleepy Hollow", "Sweet Waffle", Category::Dessert, None).await;

    catalog
        .set_allergens(
            item.id,
            &[
                (AllergenType::Milk, AllergenSeverity::Contains),
                (AllergenType::Egg, AllergenSeverity::Contains),
            ],
        )
        .await
        .unwrap();
    catalog
        .set_allergens(item.id, &[(AllergenType::Wheat, AllergenSeverity::Contains)])
        .await
        .unwrap();

    let edges = catalog.allergens_for(item.id).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].allergen_type(), Some(AllergenType::Wheat));

    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.parks, 1);
    assert_eq!(stats.restaurants, 1);
    assert_eq!(stats.menu_items, 2);
    assert_eq!(stats.with_nutrition, 1);
    assert_eq!(stats.allergen_edges, 1);
    assert_eq!(stats.by_source, vec![("crowdsourced".to_string(), 1)]);
}

#[tokio::test]
async fn test_restored_dump_is_merged_into_existing_rows() {
    let (db, _temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);

    let dump: CatalogDump = serde_json::from_str(
        r#"{
            "parks": [{"id": 1, "name": "Magic Kingdom", "location": "Orlando, FL", "timezone": null}],
            "restaurants": [{"id": 5, "park_id": 1, "name": "The Friar's Nook", "land": "Fantasyland"}],
            "menu_items": [
                {"id": 50, "restaurant_id": 5, "name": "Bratwurst Mac & Cheese", "description": null,
                 "price": 12.29, "photo_url": null, "category": "entree",
                 "is_fried": false, "is_vegetarian": false}
            ]
        }"#,
    )
    .unwrap();

    let first = catalog.restore(&dump).await;
    assert_eq!(first.stored(), 3);
    assert_eq!(first.failed, 0);

    // Restoring again updates in place rather than duplicating.
    let second = catalog.restore(&dump).await;
    assert_eq!(second.failed, 0);
    assert_eq!(catalog.list_menu_items().await.unwrap().len(), 1);

    // Later upserts by name land on the restored row.
    let item = add_item(&catalog, "The Friars Nook", "Bratwurst Mac and Cheese", Category::Entree, None).await;
    assert_eq!(item.id, 50);
}

#[tokio::test]
async fn test_restore_into_populated_catalog_matches_by_name() {
    let (db, _temp_dir) = setup_test_db().await;
    let catalog = Catalog::new(db);
    let local = add_item(&catalog, "Columbia Harbour House", "Lobster Roll", Category::Entree, None).await;
    let local_park = catalog.find_park("Magic Kingdom").await.unwrap().unwrap();

    // Same rows under hosted ids, plus a park whose hosted id is taken locally.
    let dump: CatalogDump = serde_json::from_str(&format!(
        r#"{{
            "parks": [
                {{"id": 7, "name": "Magic Kingdom", "location": "Orlando, FL", "timezone": "America/New_York"}},
                {{"id": {taken}, "name": "EPCOT", "location": null, "timezone": null}}
            ],
            "restaurants": [
                {{"id": 70, "park_id": 7, "name": "Columbia Harbour House", "land": "Liberty Square"}},
                {{"id": 71, "park_id": {taken}, "name": "Sunshine Seasons", "land": null}}
            ],
            "menu_items": [
                {{"id": 700, "restaurant_id": 70, "name": "Lobster Roll", "description": "Chilled lobster",
                  "price": 20.99, "photo_url": null, "category": "entree",
                  "is_fried": false, "is_vegetarian": false}}
            ],
            "nutritional_data": [
                {{"menu_item_id": 700, "calories": 590, "carbs": 40, "fat": 30, "protein": 35,
                  "sugar": null, "fiber": null, "sodium": null, "cholesterol": null,
                  "alcohol_grams": null, "source": "crowdsourced", "confidence_score": 60}}
            ],
            "allergens": [
                {{"menu_item_id": 700, "allergen_type": "shellfish", "severity": "contains"}}
            ]
        }}"#,
        taken = local_park.id,
    ))
    .unwrap();

    let summary = catalog.restore(&dump).await;
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.stored(), 7);

    let items = catalog.list_menu_items().await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, local.id);
    assert_eq!(items[0].description.as_deref(), Some("Chilled lobster"));

    let record = catalog.get_nutrition(local.id).await.unwrap().unwrap();
    assert_eq!(record.calories, Some(590.0));
    let allergens = catalog.allergens_for(local.id).await.unwrap();
    assert_eq!(allergens[0].allergen_type(), Some(AllergenType::Shellfish));

    // The local park is updated in place, never renamed by a colliding id.
    let parks = catalog.list_parks().await.unwrap();
    assert_eq!(parks.len(), 2);
    let magic = catalog.find_park("Magic Kingdom").await.unwrap().unwrap();
    assert_eq!(magic.id, local_park.id);
    assert_eq!(magic.timezone.as_deref(), Some("America/New_York"));
    let epcot = catalog.find_park("EPCOT").await.unwrap().unwrap();
    assert_ne!(epcot.id, local_park.id);
    let seasons = catalog.restaurants_for_park(epcot.id).await.unwrap();
    assert_eq!(seasons.len(), 1);
    assert_eq!(seasons[0].name, "Sunshine Seasons");
}
