//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use parkmenu_core::EstimateStatus;

/// Theme-park dining nutrition pipeline.
///
/// Parkmenu scrapes menu sites, merges them into a local catalog, estimates
/// missing nutrition, audits the data and syncs it with the hosted catalog.
#[derive(Parser, Debug)]
#[command(name = "parkmenu")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Catalog database file (default: parkmenu.db)
    #[arg(long, value_name = "PATH", global = true)]
    pub db: Option<PathBuf>,

    /// Config file (default: $XDG_CONFIG_HOME/parkmenu/config.toml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape menu sites and stage the extracted items
    Scrape(ScrapeArgs),

    /// Stage scraped items from a JSON-lines file
    Ingest {
        /// File with one scraped item per line
        #[arg(value_name = "FILE.jsonl")]
        file: PathBuf,
    },

    /// Load a catalog dump (parks, restaurants, items, nutrition, allergens)
    Load {
        #[arg(value_name = "FILE.json")]
        file: PathBuf,
    },

    /// Merge staged items across sources and import them into the catalog
    Merge {
        /// Show the merge result without writing to the catalog
        #[arg(long)]
        dry_run: bool,
    },

    /// Estimate nutrition for items that have none and queue it for review
    Estimate(EstimateArgs),

    /// Inspect and decide queued estimates
    Review {
        #[command(subcommand)]
        command: ReviewCommand,
    },

    /// Import approved estimates into the catalog
    Import,

    /// Check the catalog for implausible nutrition data
    Audit(AuditArgs),

    /// Show catalog and pipeline counts
    Stats,

    /// Exchange data with the hosted catalog
    Sync {
        #[command(subcommand)]
        command: SyncCommand,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// Site profile (JSON); repeat for several sites
    #[arg(long = "profile", value_name = "FILE", required = true)]
    pub profiles: Vec<PathBuf>,

    /// Minimum delay between requests to the same domain in milliseconds (0 to disable, max 60000)
    #[arg(short = 'l', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub rate_limit: Option<u64>,

    /// Maximum retry attempts for transient failures (0-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(0..=10))]
    pub max_retries: Option<u32>,
}

#[derive(Args, Debug, Clone)]
pub struct EstimateArgs {
    /// Neighbours averaged per estimate (1-50)
    #[arg(short = 'k', long = "neighbors", value_name = "N", value_parser = clap::value_parser!(u8).range(1..=50))]
    pub k: Option<u8>,

    /// Minimum neighbour similarity score (0-1)
    #[arg(long, value_name = "F", value_parser = parse_unit_interval)]
    pub min_similarity: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct AuditArgs {
    /// Apply automatic corrections
    #[arg(long)]
    pub fix: bool,

    /// With --fix, report the corrections without writing them
    #[arg(long, requires = "fix")]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug)]
pub enum ReviewCommand {
    /// List queued estimates
    List {
        /// Only show estimates with this status
        #[arg(long, value_parser = parse_status)]
        status: Option<EstimateStatus>,
    },

    /// Approve pending estimates by id, or every one above a confidence
    Approve {
        #[arg(value_name = "ID", required_unless_present = "min_confidence")]
        ids: Vec<i64>,

        /// Approve every pending estimate at or above this confidence
        #[arg(long, value_name = "N", conflicts_with = "ids", value_parser = clap::value_parser!(i64).range(0..=100))]
        min_confidence: Option<i64>,
    },

    /// Reject pending estimates
    Reject {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<i64>,

        /// Reason stored with the rejection
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Copy the hosted catalog into the local database
    Pull,
    /// Upsert local nutrition and allergens to the hosted catalog
    Push,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,
}

fn parse_unit_interval(raw: &str) -> Result<f64, String> {
    let value: f64 = raw
        .parse()
        .map_err(|_| format!("'{raw}' is not a number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0..=1"))
    }
}

fn parse_status(raw: &str) -> Result<EstimateStatus, String> {
    raw.parse().map_err(|error: parkmenu_core::ReviewError| error.to_string())
}
