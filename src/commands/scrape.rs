//! Scrape and ingest command handlers: fill the staging table.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use parkmenu_core::scrape::parse_jsonl;
use parkmenu_core::{Scraper, SiteProfile, Staging};
use tracing::{debug, info, warn};

use crate::cli::ScrapeArgs;
use crate::commands::CommandContext;
use crate::{ProcessExit, determine_exit_outcome};

fn progress_bar(show: bool, total: usize) -> ProgressBar {
    if !show {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(u64::try_from(total).unwrap_or(u64::MAX));
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

pub async fn run_scrape_command(args: &ScrapeArgs, ctx: &CommandContext) -> Result<ProcessExit> {
    let config = &ctx.config;
    if config.rate_limit == 0 {
        debug!("rate limiting disabled");
    } else {
        debug!(rate_limit_ms = config.rate_limit, "rate limiting enabled");
    }
    let scraper = Scraper::new(config.rate_limit_delay(), config.retry_policy())?;
    let staging = Staging::new(ctx.open_database().await?);

    let bar = progress_bar(ctx.show_progress, args.profiles.len());
    let mut pages_ok = 0;
    let mut failures = 0;
    let mut inserted = 0;
    let mut duplicates = 0;

    for path in &args.profiles {
        let profile = match SiteProfile::load(path) {
            Ok(profile) => profile,
            Err(error) => {
                warn!(profile = %path.display(), error = %error, "profile skipped");
                failures += 1;
                bar.inc(1);
                continue;
            }
        };
        bar.set_message(format!("Scraping {}...", profile.name));

        let report = scraper.scrape_site(&profile).await;
        let staged = staging.stage(&report.items).await?;

        pages_ok += report.pages_ok;
        failures += report.failed_pages.len();
        inserted += staged.inserted;
        duplicates += staged.duplicates;
        bar.suspend(|| {
            println!(
                "{}: {} items from {} pages ({} failed), {} new, {} already staged",
                profile.name,
                report.items.len(),
                report.pages_ok,
                report.failed_pages.len(),
                staged.inserted,
                staged.duplicates
            );
        });
        bar.inc(1);
    }
    bar.finish_and_clear();

    println!(
        "Scraped {pages_ok} pages: {inserted} new items staged, {duplicates} duplicates, {failures} failures"
    );
    info!(pages_ok, inserted, duplicates, failures, "scrape complete");
    Ok(determine_exit_outcome(pages_ok, failures))
}

pub async fn run_ingest_command(file: &Path, ctx: &CommandContext) -> Result<ProcessExit> {
    let raw = read_input(file)?;
    let (items, errors) = parse_jsonl(&raw);
    for error in &errors {
        warn!(file = %file.display(), error = %error, "line skipped");
    }

    let staging = Staging::new(ctx.open_database().await?);
    let staged = staging.stage(&items).await?;

    println!(
        "Ingested {}: {} new items staged, {} duplicates, {} malformed lines",
        file.display(),
        staged.inserted,
        staged.duplicates,
        errors.len()
    );
    Ok(determine_exit_outcome(items.len(), errors.len()))
}

pub(crate) fn read_input(file: &Path) -> Result<String> {
    std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read '{}'", file.display()))
}
