//! Load and stats command handlers.

use std::path::Path;

use anyhow::{Context, Result};
use parkmenu_core::{Catalog, CatalogDump, EstimateStatus, Review, Staging};

use crate::commands::CommandContext;
use crate::commands::scrape::read_input;
use crate::{ProcessExit, determine_exit_outcome};

pub async fn run_load_command(file: &Path, ctx: &CommandContext) -> Result<ProcessExit> {
    let raw = read_input(file)?;
    let dump: CatalogDump = serde_json::from_str(&raw)
        .with_context(|| format!("'{}' is not a catalog dump", file.display()))?;

    let catalog = Catalog::new(ctx.open_database().await?);
    let summary = catalog.restore(&dump).await;

    println!(
        "Loaded {}: {} parks, {} restaurants, {} menu items, {} nutrition records, {} allergens ({} rows failed)",
        file.display(),
        summary.parks,
        summary.restaurants,
        summary.menu_items,
        summary.nutrition,
        summary.allergens,
        summary.failed
    );
    Ok(determine_exit_outcome(summary.stored(), summary.failed))
}

pub async fn run_stats_command(ctx: &CommandContext) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let catalog = Catalog::new(db.clone());
    let stats = catalog.stats().await?;
    let (staged_pending, staged_merged) = Staging::new(db.clone()).counts().await?;
    let review = Review::new(db);

    println!("parks = {}", stats.parks);
    println!("restaurants = {}", stats.restaurants);
    println!("menu_items = {}", stats.menu_items);
    println!("with_nutrition = {}", stats.with_nutrition);
    for (source, count) in &stats.by_source {
        println!("  nutrition.{source} = {count}");
    }
    println!("allergen_edges = {}", stats.allergen_edges);
    println!("staged.pending = {staged_pending}");
    println!("staged.merged = {staged_merged}");
    for status in EstimateStatus::ALL {
        println!(
            "estimates.{status} = {}",
            review.count_by_status(status).await?
        );
    }
    Ok(ProcessExit::Success)
}
