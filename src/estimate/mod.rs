//! Nearest-neighbour nutrition estimation for items without data.
//!
//! Each target is compared with catalog items that carry real (non-estimated)
//! nutrition and share at least one keyword. The top-scoring neighbours are
//! averaged, weighted by score.

mod keywords;

pub use keywords::keywords;

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::catalog::{
    CatalogError, CatalogRepository, MenuItem, NutrientField, NutritionFacts, NutritionSource,
};
use crate::matching::{jaccard, similarity};

/// Default neighbour count.
pub const DEFAULT_K: usize = 5;

/// Default minimum neighbour score.
pub const DEFAULT_MIN_SIMILARITY: f64 = 0.2;

/// Highest confidence an estimate can carry.
pub const MAX_ESTIMATE_CONFIDENCE: i64 = 50;

/// Score multiplier for neighbours from a different category.
const CROSS_CATEGORY_FACTOR: f64 = 0.6;

/// Estimator tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorConfig {
    pub k: usize,
    pub min_similarity: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_K,
            min_similarity: DEFAULT_MIN_SIMILARITY,
        }
    }
}

/// A neighbour that contributed to an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub menu_item_id: i64,
    pub score: f64,
}

/// An estimated nutrition profile awaiting review.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    pub menu_item_id: i64,
    pub facts: NutritionFacts,
    pub confidence: i64,
    pub neighbors: Vec<Neighbor>,
}

/// Outcome of an estimation pass.
#[derive(Debug, Clone, Default)]
pub struct EstimateRun {
    pub estimates: Vec<Estimate>,
    /// Items with no qualifying neighbour.
    pub skipped: Vec<i64>,
}

/// A catalog item with usable reference nutrition.
#[derive(Debug, Clone)]
pub struct Reference {
    pub item: MenuItem,
    pub facts: NutritionFacts,
    pub keywords: HashSet<String>,
}

impl Reference {
    /// Builds a reference from an item and its nutrition.
    #[must_use]
    pub fn new(item: MenuItem, facts: NutritionFacts) -> Self {
        let keywords = keywords(&item.name, item.description.as_deref());
        Self {
            item,
            facts,
            keywords,
        }
    }
}

fn neighbor_score(target: &MenuItem, target_keywords: &HashSet<String>, reference: &Reference) -> f64 {
    let base = 0.5 * similarity(&target.name, &reference.item.name)
        + 0.5 * jaccard(target_keywords, &reference.keywords);
    if target.category() == reference.item.category() {
        base
    } else {
        base * CROSS_CATEGORY_FACTOR
    }
}

/// Picks the top `k` neighbours of `target`, best first. Ties go to the lower id.
#[must_use]
pub fn nearest_neighbors(
    target: &MenuItem,
    references: &[Reference],
    config: &EstimatorConfig,
) -> Vec<(Neighbor, NutritionFacts)> {
    let target_keywords = keywords(&target.name, target.description.as_deref());
    if target_keywords.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(Neighbor, NutritionFacts)> = references
        .iter()
        .filter(|reference| reference.item.id != target.id)
        .filter(|reference| !reference.keywords.is_disjoint(&target_keywords))
        .map(|reference| {
            let neighbor = Neighbor {
                menu_item_id: reference.item.id,
                score: neighbor_score(target, &target_keywords, reference),
            };
            (neighbor, reference.facts)
        })
        .filter(|(neighbor, _)| neighbor.score >= config.min_similarity)
        .collect();

    scored.sort_by(|(a, _), (b, _)| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.menu_item_id.cmp(&b.menu_item_id))
    });
    scored.truncate(config.k);
    scored
}

/// Averages neighbour nutrition, weighted by score.
///
/// A nutrient no neighbour reports stays `None`. Sugar and fiber are capped
/// at carbs afterwards.
#[must_use]
pub fn weighted_average(neighbors: &[(Neighbor, NutritionFacts)]) -> NutritionFacts {
    let mut facts = NutritionFacts::default();
    for field in NutrientField::ALL {
        let (sum, weight) = neighbors
            .iter()
            .filter_map(|(neighbor, facts)| field.get(facts).map(|value| (neighbor.score, value)))
            .fold((0.0, 0.0), |(sum, weight), (score, value)| {
                (sum + score * value, weight + score)
            });
        if weight > 0.0 {
            field.set(&mut facts, Some(sum / weight));
        }
    }

    if let Some(carbs) = facts.carbs {
        facts.sugar = facts.sugar.map(|sugar| sugar.min(carbs));
        facts.fiber = facts.fiber.map(|fiber| fiber.min(carbs));
    }
    facts
}

/// Confidence for an estimate built from `neighbors` out of a possible `k`.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn estimate_confidence(neighbors: &[Neighbor], k: usize) -> i64 {
    if neighbors.is_empty() || k == 0 {
        return 1;
    }
    let n = neighbors.len() as f64;
    let mean = neighbors.iter().map(|neighbor| neighbor.score).sum::<f64>() / n;
    let raw = (MAX_ESTIMATE_CONFIDENCE as f64 * mean * n / k as f64).round() as i64;
    raw.clamp(1, MAX_ESTIMATE_CONFIDENCE)
}

/// Estimates one item from the references, or `None` without neighbours.
#[must_use]
pub fn estimate_item(
    target: &MenuItem,
    references: &[Reference],
    config: &EstimatorConfig,
) -> Option<Estimate> {
    let neighbors = nearest_neighbors(target, references, config);
    if neighbors.is_empty() {
        return None;
    }
    let facts = weighted_average(&neighbors);
    let neighbors: Vec<Neighbor> = neighbors.into_iter().map(|(neighbor, _)| neighbor).collect();
    Some(Estimate {
        menu_item_id: target.id,
        facts,
        confidence: estimate_confidence(&neighbors, config.k),
        neighbors,
    })
}

/// Estimates nutrition for every catalog item that has none.
///
/// # Errors
///
/// Returns [`CatalogError`] if the catalog cannot be read.
#[instrument(skip(repo))]
pub async fn estimate_missing(
    repo: &dyn CatalogRepository,
    config: &EstimatorConfig,
) -> Result<EstimateRun, CatalogError> {
    let items = repo.list_menu_items().await?;
    let mut nutrition: HashMap<i64, _> = repo
        .list_nutrition()
        .await?
        .into_iter()
        .map(|record| (record.menu_item_id, record))
        .collect();

    let mut references = Vec::new();
    let mut targets = Vec::new();
    for item in items {
        match nutrition.remove(&item.id) {
            Some(record) if record.source() != NutritionSource::Estimated => {
                let facts = record.facts();
                references.push(Reference::new(item, facts));
            }
            Some(_) => {}
            None => targets.push(item),
        }
    }
    debug!(references = references.len(), targets = targets.len(), "estimator inputs");

    let mut run = EstimateRun::default();
    for target in &targets {
        match estimate_item(target, &references, config) {
            Some(estimate) => run.estimates.push(estimate),
            None => {
                debug!(menu_item_id = target.id, name = %target.name, "no neighbours, skipped");
                run.skipped.push(target.id);
            }
        }
    }

    info!(
        estimated = run.estimates.len(),
        skipped = run.skipped.len(),
        "estimation finished"
    );
    Ok(run)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Database;
    use crate::catalog::{Catalog, Category, NewMenuItem};

    fn item(id: i64, name: &str, category: Category) -> MenuItem {
        MenuItem {
            id,
            restaurant_id: 1,
            name: name.to_string(),
            description: None,
            price: None,
            photo_url: None,
            category_str: category.as_str().to_string(),
            is_fried: false,
            is_vegetarian: false,
            name_key: String::new(),
        }
    }

    fn facts(calories: f64, carbs: f64, sugar: f64) -> NutritionFacts {
        NutritionFacts {
            calories: Some(calories),
            carbs: Some(carbs),
            sugar: Some(sugar),
            ..NutritionFacts::default()
        }
    }

    #[test]
    fn test_nearest_neighbors_requires_shared_keyword() {
        let target = item(1, "Pulled Pork Sandwich", Category::Entree);
        let references = vec![
            Reference::new(item(2, "Mango Smoothie", Category::Beverage), facts(300.0, 60.0, 50.0)),
            Reference::new(item(3, "Pulled Pork Nachos", Category::Snack), facts(900.0, 70.0, 5.0)),
        ];
        let found = nearest_neighbors(&target, &references, &EstimatorConfig::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0.menu_item_id, 3);
    }

    #[test]
    fn test_nearest_neighbors_same_category_scores_higher() {
        let target = item(1, "Chicken Sandwich", Category::Entree);
        let same = Reference::new(item(2, "Chicken Wrap", Category::Entree), facts(600.0, 50.0, 4.0));
        let other = Reference::new(item(3, "Chicken Soup", Category::Side), facts(200.0, 20.0, 2.0));
        let found = nearest_neighbors(&target, &[other, same], &EstimatorConfig::default());
        assert_eq!(found[0].0.menu_item_id, 2);
        assert!(found[0].0.score > found[1].0.score);
    }

    #[test]
    fn test_nearest_neighbors_ties_prefer_lower_id_and_truncate_to_k() {
        let target = item(10, "Turkey Leg", Category::Entree);
        let references: Vec<Reference> = (1..=4)
            .rev()
            .map(|id| Reference::new(item(id, "Turkey Leg", Category::Entree), facts(1100.0, 0.0, 0.0)))
            .collect();
        let config = EstimatorConfig {
            k: 2,
            ..EstimatorConfig::default()
        };
        let found = nearest_neighbors(&target, &references, &config);
        let ids: Vec<i64> = found.iter().map(|(n, _)| n.menu_item_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_nearest_neighbors_excludes_target_itself() {
        let target = item(1, "Turkey Leg", Category::Entree);
        let references = vec![Reference::new(item(1, "Turkey Leg", Category::Entree), facts(1.0, 1.0, 1.0))];
        assert!(nearest_neighbors(&target, &references, &EstimatorConfig::default()).is_empty());
    }

    #[test]
    fn test_weighted_average_and_clamp() {
        let neighbors = vec![
            (Neighbor { menu_item_id: 1, score: 1.0 }, facts(400.0, 40.0, 60.0)),
            (
                Neighbor { menu_item_id: 2, score: 0.5 },
                NutritionFacts {
                    calories: Some(700.0),
                    protein: Some(30.0),
                    ..NutritionFacts::default()
                },
            ),
        ];
        let averaged = weighted_average(&neighbors);
        assert!((averaged.calories.unwrap() - 500.0).abs() < 1e-9);
        assert!((averaged.protein.unwrap() - 30.0).abs() < 1e-9);
        assert_eq!(averaged.carbs, Some(40.0));
        // 60 g sugar capped to 40 g carbs.
        assert_eq!(averaged.sugar, Some(40.0));
        assert_eq!(averaged.fat, None);
    }

    #[test]
    fn test_estimate_confidence_bounds() {
        let full: Vec<Neighbor> = (1..=5).map(|id| Neighbor { menu_item_id: id, score: 1.0 }).collect();
        assert_eq!(estimate_confidence(&full, 5), MAX_ESTIMATE_CONFIDENCE);

        let weak = [Neighbor { menu_item_id: 1, score: 0.2 }];
        // 50 * 0.2 * 1/5 = 2
        assert_eq!(estimate_confidence(&weak, 5), 2);

        let tiny = [Neighbor { menu_item_id: 1, score: 0.01 }];
        assert_eq!(estimate_confidence(&tiny, 5), 1);
    }

    #[tokio::test]
    async fn test_estimate_missing_uses_real_nutrition_only() {
        let catalog = Catalog::new(Database::new_in_memory().await.unwrap());
        let park = catalog.upsert_park("Epcot", None, None).await.unwrap();
        let venue = catalog.upsert_restaurant(park.id, "Regal Eagle", None).await.unwrap();

        let mut ids = Vec::new();
        for name in ["Smoked Brisket Platter", "Smoked Brisket Sandwich", "Smoked Turkey Platter", "Kale Salad"] {
            let created = catalog
                .upsert_menu_item(
                    venue.id,
                    &NewMenuItem {
                        name,
                        description: None,
                        price: None,
                        photo_url: None,
                        category: Category::Entree,
                        is_fried: false,
                        is_vegetarian: false,
                    },
                )
                .await
                .unwrap();
            ids.push(created.id);
        }
        catalog
            .upsert_nutrition(ids[0], &facts(1000.0, 40.0, 10.0), NutritionSource::Official, 95)
            .await
            .unwrap();
        catalog
            .upsert_nutrition(ids[2], &facts(9999.0, 1.0, 1.0), NutritionSource::Estimated, 20)
            .await
            .unwrap();

        let run = estimate_missing(&catalog, &EstimatorConfig::default()).await.unwrap();
        assert_eq!(run.estimates.len(), 1);
        let estimate = &run.estimates[0];
        assert_eq!(estimate.menu_item_id, ids[1]);
        assert_eq!(estimate.facts.calories, Some(1000.0));
        assert_eq!(estimate.neighbors.len(), 1);
        assert_eq!(estimate.neighbors[0].menu_item_id, ids[0]);
        assert!(estimate.confidence >= 1 && estimate.confidence <= MAX_ESTIMATE_CONFIDENCE);
        assert_eq!(run.skipped, vec![ids[3]]);
    }
}
