use parkmenu_core::catalog::{Catalog, Category, MenuItem, NewMenuItem, NutritionFacts, NutritionSource};
use parkmenu_core::scrape::{ScrapedItem, SelectorSet, SiteProfile, SourceKind};
use parkmenu_core::Database;
use tempfile::TempDir;

/// Creates a file-backed test database with migrations applied.
pub async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("catalog.db");

    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");

    (db, temp_dir)
}

/// Selectors matching [`menu_page`].
pub fn selectors() -> SelectorSet {
    SelectorSet {
        restaurant: "section.venue".to_string(),
        restaurant_name: "h2.venue-name".to_string(),
        land: Some(".land".to_string()),
        item: "li.item".to_string(),
        item_name: ".name".to_string(),
        description: Some(".desc".to_string()),
        price: Some(".price".to_string()),
        photo: Some("img".to_string()),
        calories: Some(".cal".to_string()),
    }
}

pub fn profile(name: &str, source_kind: SourceKind, park: &str, pages: Vec<String>) -> SiteProfile {
    SiteProfile {
        name: name.to_string(),
        source_kind,
        park: park.to_string(),
        pages,
        selectors: selectors(),
    }
}

/// A menu item row for [`menu_page`]: name, description, price text, calories text.
pub struct Row<'a> {
    pub name: &'a str,
    pub desc: Option<&'a str>,
    pub price: Option<&'a str>,
    pub cal: Option<&'a str>,
}

/// Renders one restaurant block in the layout [`selectors`] expects.
pub fn menu_page(venue: &str, land: &str, rows: &[Row<'_>]) -> String {
    let mut items = String::new();
    for row in rows {
        items.push_str("<li class=\"item\">");
        items.push_str(&format!("<span class=\"name\">{}</span>", row.name));
        if let Some(desc) = row.desc {
            items.push_str(&format!("<p class=\"desc\">{desc}</p>"));
        }
        if let Some(price) = row.price {
            items.push_str(&format!("<span class=\"price\">{price}</span>"));
        }
        if let Some(cal) = row.cal {
            items.push_str(&format!("<span class=\"cal\">{cal}</span>"));
        }
        items.push_str("<img src=\"/img/item.jpg\"></li>");
    }
    format!(
        "<html><body><section class=\"venue\"><h2 class=\"venue-name\">{venue}</h2>\
         <span class=\"land\">{land}</span><ul>{items}</ul></section></body></html>"
    )
}

pub fn scraped(
    source_kind: SourceKind,
    source_name: &str,
    restaurant: &str,
    name: &str,
    price: Option<f64>,
) -> ScrapedItem {
    ScrapedItem {
        source_kind,
        source_name: source_name.to_string(),
        page_url: format!("https://{source_name}/menu"),
        park: "Magic Kingdom".to_string(),
        restaurant: restaurant.to_string(),
        land: None,
        name: name.to_string(),
        description: None,
        price,
        photo_url: None,
        nutrition: None,
    }
}

pub fn facts(calories: f64, carbs: f64, fat: f64, protein: f64) -> NutritionFacts {
    NutritionFacts {
        calories: Some(calories),
        carbs: Some(carbs),
        fat: Some(fat),
        protein: Some(protein),
        ..NutritionFacts::default()
    }
}

/// Adds an item to a restaurant, creating the park and restaurant as needed.
pub async fn add_item(
    catalog: &Catalog,
    restaurant: &str,
    name: &str,
    category: Category,
    nutrition: Option<(NutritionFacts, NutritionSource, i64)>,
) -> MenuItem {
    let park = catalog
        .upsert_park("Magic Kingdom", Some("Orlando, FL"), None)
        .await
        .unwrap();
    let venue = catalog
        .upsert_restaurant(park.id, restaurant, None)
        .await
        .unwrap();
    let item = catalog
        .upsert_menu_item(
            venue.id,
            &NewMenuItem {
                name,
                description: None,
                price: None,
                photo_url: None,
                category,
                is_fried: false,
                is_vegetarian: false,
            },
        )
        .await
        .unwrap();
    if let Some((facts, source, confidence)) = nutrition {
        catalog
            .upsert_nutrition(item.id, &facts, source, confidence)
            .await
            .unwrap();
    }
    item
}
