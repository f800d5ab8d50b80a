//! Audit command handler: report findings and optionally fix them.

use anyhow::Result;
use parkmenu_core::{AuditReport, Catalog, Severity, apply_fixes, audit_catalog};

use crate::ProcessExit;
use crate::cli::AuditArgs;
use crate::commands::CommandContext;

fn print_report(report: &AuditReport) {
    println!(
        "Audited {} items: {} findings",
        report.items_checked,
        report.findings.len()
    );
    for (severity, count) in &report.by_severity {
        println!("  {severity}: {count}");
    }
    for (rule, count) in &report.by_rule {
        println!("  {rule} = {count}");
    }
    for finding in report
        .findings
        .iter()
        .filter(|finding| finding.severity() >= Severity::Warning)
    {
        println!(
            "{:<7} {:<24} #{} {}: {}",
            finding.severity().as_str(),
            finding.rule.as_str(),
            finding.menu_item_id,
            finding.item_name,
            finding.message
        );
    }
}

pub async fn run_audit_command(args: &AuditArgs, ctx: &CommandContext) -> Result<ProcessExit> {
    let catalog = Catalog::new(ctx.open_database().await?);
    let report = audit_catalog(&catalog).await?;
    print_report(&report);

    if !args.fix {
        return Ok(if report.has_errors() {
            ProcessExit::Partial
        } else {
            ProcessExit::Success
        });
    }

    let summary = apply_fixes(&catalog, &report, args.dry_run).await?;
    let verb = if summary.dry_run { "Would apply" } else { "Applied" };
    println!(
        "{verb} {} fixes; {} findings are report-only; {} items failed",
        summary.applied, summary.report_only, summary.failed_items
    );
    for (rule, count) in &summary.by_rule {
        println!("  {rule} = {count}");
    }

    Ok(if summary.failed_items > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Success
    })
}
