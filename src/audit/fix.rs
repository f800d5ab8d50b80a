//! Batch correction of audit findings.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument, warn};

use super::{AuditReport, AuditRule, CONFIDENCE_RANGE, Finding, is_caloric_mismatch};
use crate::catalog::{
    CatalogError, CatalogRepository, NewAuditLogEntry, NutrientField, NutritionRecord,
    NutritionSource,
};

/// Column name logged for confidence corrections.
const CONFIDENCE_COLUMN: &str = "confidence_score";

/// Outcome of [`apply_fixes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixSummary {
    pub applied: usize,
    pub by_rule: BTreeMap<&'static str, usize>,
    /// Findings with no automatic correction (report-only rules, official data).
    pub report_only: usize,
    /// Items whose corrections could not be written.
    pub failed_items: usize,
    pub dry_run: bool,
}

enum Change {
    Nutrient {
        field: NutrientField,
        old: f64,
        new: f64,
    },
    Confidence {
        old: i64,
        new: i64,
    },
}

/// Works out the correction for a finding against the item's current values.
///
/// Values are read from `record`, which already reflects earlier fixes, so
/// the carbs rules see corrected carbs.
fn plan_change(finding: &Finding, record: &NutritionRecord) -> Option<Change> {
    let facts = record.facts();
    match finding.rule {
        AuditRule::NegativeValue => {
            let field = finding.field?;
            let old = field.get(&facts)?;
            (old < 0.0).then_some(Change::Nutrient { field, old, new: 0.0 })
        }
        AuditRule::SugarExceedsCarbs => {
            let (old, carbs) = (facts.sugar?, facts.carbs?);
            (old > carbs).then_some(Change::Nutrient {
                field: NutrientField::Sugar,
                old,
                new: carbs,
            })
        }
        AuditRule::FiberExceedsCarbs => {
            let (old, carbs) = (facts.fiber?, facts.carbs?);
            (old > carbs).then_some(Change::Nutrient {
                field: NutrientField::Fiber,
                old,
                new: carbs,
            })
        }
        AuditRule::CaloricMismatch => {
            if record.source() == NutritionSource::Official {
                return None;
            }
            let (old, expected) = (facts.calories?, facts.expected_calories()?);
            is_caloric_mismatch(old, expected).then_some(Change::Nutrient {
                field: NutrientField::Calories,
                old,
                new: expected.round(),
            })
        }
        AuditRule::ConfidenceOutOfRange => {
            let old = record.confidence_score;
            let new = old.clamp(CONFIDENCE_RANGE.0, CONFIDENCE_RANGE.1);
            (new != old).then_some(Change::Confidence { old, new })
        }
        AuditRule::CalorieOutOfRange | AuditRule::MissingNutrition => None,
    }
}

#[allow(clippy::cast_precision_loss)]
async fn write_change(
    repo: &dyn CatalogRepository,
    menu_item_id: i64,
    rule: AuditRule,
    change: &Change,
) -> Result<(), CatalogError> {
    let entry = match *change {
        Change::Nutrient { field, old, new } => {
            repo.update_nutrition_field(menu_item_id, field, Some(new)).await?;
            NewAuditLogEntry {
                menu_item_id,
                rule: rule.as_str(),
                field: field.column(),
                old_value: Some(old),
                new_value: Some(new),
            }
        }
        Change::Confidence { old, new } => {
            repo.set_confidence(menu_item_id, new).await?;
            NewAuditLogEntry {
                menu_item_id,
                rule: rule.as_str(),
                field: CONFIDENCE_COLUMN,
                old_value: Some(old as f64),
                new_value: Some(new as f64),
            }
        }
    };
    repo.record_audit_fix(&entry).await?;
    Ok(())
}

fn apply_to_record(record: &mut NutritionRecord, change: &Change) {
    match *change {
        Change::Nutrient { field, new, .. } => {
            let mut facts = record.facts();
            field.set(&mut facts, Some(new));
            record.set_facts(&facts);
        }
        Change::Confidence { new, .. } => record.confidence_score = new,
    }
}

/// Applies automatic corrections for a report's findings, in report order.
///
/// Each item is re-read before fixing and every correction is logged to
/// `audit_log`. With `dry_run` nothing is written, but the summary is the
/// same a real run would produce.
///
/// # Errors
///
/// Returns [`CatalogError`] only if an item's current nutrition cannot be
/// read; write failures are logged per item.
#[instrument(skip(repo, report), fields(findings = report.findings.len()))]
pub async fn apply_fixes(
    repo: &dyn CatalogRepository,
    report: &AuditReport,
    dry_run: bool,
) -> Result<FixSummary, CatalogError> {
    let mut summary = FixSummary {
        dry_run,
        ..FixSummary::default()
    };

    for group in report.findings.chunk_by(|a, b| a.menu_item_id == b.menu_item_id) {
        let menu_item_id = group[0].menu_item_id;
        let Some(mut record) = repo.get_nutrition(menu_item_id).await? else {
            summary.report_only += group.len();
            continue;
        };

        for finding in group {
            let Some(change) = plan_change(finding, &record) else {
                summary.report_only += 1;
                continue;
            };
            if !dry_run
                && let Err(error) = write_change(repo, menu_item_id, finding.rule, &change).await
            {
                warn!(menu_item_id, rule = %finding.rule, error = %error, "fix failed, skipping item");
                summary.failed_items += 1;
                break;
            }
            apply_to_record(&mut record, &change);
            summary.applied += 1;
            *summary.by_rule.entry(finding.rule.as_str()).or_insert(0) += 1;
            debug!(menu_item_id, rule = %finding.rule, dry_run, "fix applied");
        }
    }

    info!(
        applied = summary.applied,
        report_only = summary.report_only,
        failed_items = summary.failed_items,
        dry_run,
        "audit fixes finished"
    );
    Ok(summary)
}
