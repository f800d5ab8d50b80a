//! Review command handlers: list, approve and reject queued estimates.

use anyhow::Result;
use parkmenu_core::review::EstimateRecord;
use parkmenu_core::{Catalog, EstimateStatus, Review};
use tracing::warn;

use crate::commands::CommandContext;
use crate::{ProcessExit, determine_exit_outcome};

fn fmt_nutrient(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.0}"))
}

pub async fn run_review_list_command(
    status: Option<EstimateStatus>,
    ctx: &CommandContext,
) -> Result<ProcessExit> {
    let db = ctx.open_database().await?;
    let catalog = Catalog::new(db.clone());
    let review = Review::new(db);

    let records: Vec<EstimateRecord> = match status {
        Some(status) => review.list_by_status(status).await?,
        None => review.list_all().await?,
    };
    if records.is_empty() {
        println!("No estimates found.");
        return Ok(ProcessExit::Success);
    }

    println!("ID     STATUS    CONF  KCAL  CARBS  ITEM");
    for record in &records {
        let name = catalog
            .get_menu_item(record.menu_item_id)
            .await?
            .map_or_else(|| format!("#{}", record.menu_item_id), |item| item.name);
        let (calories, carbs) = match record.facts() {
            Ok(facts) => (facts.calories, facts.carbs),
            Err(error) => {
                warn!(id = record.id, error = %error, "estimate payload unreadable");
                (None, None)
            }
        };
        println!(
            "{:<6} {:<9} {:>4}  {:>4}  {:>5}  {}",
            record.id,
            record.status().as_str(),
            record.confidence_score,
            fmt_nutrient(calories),
            fmt_nutrient(carbs),
            name
        );
        if let Some(note) = &record.note {
            println!("       note: {note}");
        }
    }
    Ok(ProcessExit::Success)
}

pub async fn run_review_approve_command(
    ids: &[i64],
    min_confidence: Option<i64>,
    ctx: &CommandContext,
) -> Result<ProcessExit> {
    let review = Review::new(ctx.open_database().await?);

    if let Some(min_confidence) = min_confidence {
        let approved = review.approve_above(min_confidence).await?;
        println!("Approved {approved} pending estimates with confidence >= {min_confidence}");
        return Ok(ProcessExit::Success);
    }

    let mut approved = 0;
    let mut failed = 0;
    for &id in ids {
        match review.approve(id).await {
            Ok(()) => approved += 1,
            Err(error) => {
                warn!(id, error = %error, "estimate not approved");
                failed += 1;
            }
        }
    }
    println!("Approved {approved} estimates ({failed} failed)");
    Ok(determine_exit_outcome(approved, failed))
}

pub async fn run_review_reject_command(
    ids: &[i64],
    note: Option<&str>,
    ctx: &CommandContext,
) -> Result<ProcessExit> {
    let review = Review::new(ctx.open_database().await?);

    let mut rejected = 0;
    let mut failed = 0;
    for &id in ids {
        match review.reject(id, note).await {
            Ok(()) => rejected += 1,
            Err(error) => {
                warn!(id, error = %error, "estimate not rejected");
                failed += 1;
            }
        }
    }
    println!("Rejected {rejected} estimates ({failed} failed)");
    Ok(determine_exit_outcome(rejected, failed))
}
