//! Merge, estimate and import command handlers.

use anyhow::Result;
use parkmenu_core::{Catalog, Review, Staging, estimate_missing, run_merge};
use tracing::warn;

use crate::commands::CommandContext;
use crate::{ProcessExit, determine_exit_outcome};

pub async fn run_merge_command(dry_run: bool, ctx: &CommandContext) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let catalog = Catalog::new(db.clone());
    let staging = Staging::new(db);

    let run = run_merge(&catalog, &staging, &ctx.config.thresholds, dry_run).await?;

    for item in run.merged.iter().filter(|item| item.price_conflict.is_some()) {
        if let Some(conflict) = &item.price_conflict {
            let prices: Vec<String> = conflict
                .prices
                .iter()
                .map(|(source, price)| format!("{source} ${price:.2}"))
                .collect();
            println!(
                "price conflict: {} / {} / {}: {}",
                item.park,
                item.restaurant,
                item.name,
                prices.join(", ")
            );
        }
    }

    let Some(summary) = run.import else {
        println!(
            "Dry run: {} staged rows would merge into {} items",
            run.staged_rows,
            run.merged.len()
        );
        return Ok(ProcessExit::Success);
    };

    println!(
        "Merged {} staged rows into {} items: {} parks, {} restaurants and {} items created, {} items updated, {} nutrition records written, {} price conflicts, {} failed",
        run.staged_rows,
        run.merged.len(),
        summary.parks_created,
        summary.restaurants_created,
        summary.items_created,
        summary.items_updated,
        summary.nutrition_written,
        summary.price_conflicts,
        summary.failed
    );
    Ok(determine_exit_outcome(
        run.merged.len().saturating_sub(summary.failed),
        summary.failed,
    ))
}

pub async fn run_estimate_command(ctx: &CommandContext) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let catalog = Catalog::new(db.clone());
    let review = Review::new(db);

    let run = estimate_missing(&catalog, &ctx.config.estimator).await?;
    let mut queued = 0;
    let mut failed = 0;
    for estimate in &run.estimates {
        match review.enqueue(estimate).await {
            Ok(_) => queued += 1,
            Err(error) => {
                warn!(menu_item_id = estimate.menu_item_id, error = %error, "estimate not queued");
                failed += 1;
            }
        }
    }

    println!(
        "Queued {queued} estimates for review (k = {}, min similarity = {}); {} items had no similar reference",
        ctx.config.estimator.k,
        ctx.config.estimator.min_similarity,
        run.skipped.len()
    );
    Ok(determine_exit_outcome(queued, failed))
}

pub async fn run_import_command(ctx: &CommandContext) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let catalog = Catalog::new(db.clone());
    let review = Review::new(db);

    let summary = review.import_approved(&catalog).await?;
    println!(
        "Imported {} estimates; {} skipped (item already has nutrition), {} rejected as invalid",
        summary.imported, summary.skipped_existing, summary.rejected_invalid
    );
    Ok(ProcessExit::Success)
}
