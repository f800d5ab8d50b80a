//! CLI entry point for parkmenu.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app_config;
mod cli;
mod commands;
mod terminal;

use app_config::{CliOverrides, EffectiveConfig, EnvOverrides, load_config};
use cli::{Cli, Command};
use commands::CommandContext;

/// Process outcome, mapped to the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    /// Some rows or pages failed while others succeeded.
    Partial,
    Failure,
}

impl ProcessExit {
    fn code(self) -> ExitCode {
        match self {
            Self::Success => ExitCode::SUCCESS,
            Self::Failure => ExitCode::from(1),
            Self::Partial => ExitCode::from(2),
        }
    }
}

/// Maps succeeded and failed counts to the process outcome.
pub(crate) fn determine_exit_outcome(succeeded: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if succeeded > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    terminal::init_tracing(default_level, terminal::is_no_color_requested());
    debug!(?cli, "CLI arguments parsed");

    let loaded = load_config(cli.config.as_deref())?;
    let overrides = cli_overrides(&cli);
    let config = EffectiveConfig::resolve(&overrides, &EnvOverrides::from_env(), loaded.config.as_ref());
    debug!(db = %config.db_path.display(), loaded_from_file = loaded.loaded_from_file, "configuration resolved");

    let ctx = CommandContext {
        config,
        loaded,
        show_progress: terminal::should_use_spinner(cli.quiet),
    };

    let outcome = commands::dispatch(&cli.command, &ctx).await?;
    info!(?outcome, "parkmenu finished");
    Ok(outcome.code())
}

fn cli_overrides(cli: &Cli) -> CliOverrides {
    let mut overrides = CliOverrides {
        db_path: cli.db.clone(),
        ..CliOverrides::default()
    };
    match &cli.command {
        Command::Scrape(args) => {
            overrides.rate_limit = args.rate_limit;
            overrides.max_retries = args.max_retries;
        }
        Command::Estimate(args) => {
            overrides.estimate_k = args.k.map(usize::from);
            overrides.min_similarity = args.min_similarity;
        }
        _ => {}
    }
    overrides
}
