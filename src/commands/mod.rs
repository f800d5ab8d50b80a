//! CLI command handlers.

mod audit;
mod catalog;
mod config;
mod pipeline;
mod review;
mod scrape;
mod sync;

use anyhow::{Context, Result};
use parkmenu_core::Database;

use crate::ProcessExit;
use crate::app_config::{EffectiveConfig, LoadedConfig};
use crate::cli::{Command, ConfigCommand, ReviewCommand};

/// Settings shared by every command.
pub(crate) struct CommandContext {
    pub(crate) config: EffectiveConfig,
    pub(crate) loaded: LoadedConfig,
    pub(crate) show_progress: bool,
}

impl CommandContext {
    /// Opens the catalog database, creating and migrating it if needed.
    pub(crate) async fn open_database(&self) -> Result<Database> {
        let path = &self.config.db_path;
        Database::new(path)
            .await
            .with_context(|| format!("Failed to open catalog database '{}'", path.display()))
    }
}

/// Runs one subcommand.
pub(crate) async fn dispatch(command: &Command, ctx: &CommandContext) -> Result<ProcessExit> {
    match command {
        Command::Scrape(args) => scrape::run_scrape_command(args, ctx).await,
        Command::Ingest { file } => scrape::run_ingest_command(file, ctx).await,
        Command::Load { file } => catalog::run_load_command(file, ctx).await,
        Command::Merge { dry_run } => pipeline::run_merge_command(*dry_run, ctx).await,
        Command::Estimate(_) => pipeline::run_estimate_command(ctx).await,
        Command::Review { command } => match command {
            ReviewCommand::List { status } => review::run_review_list_command(*status, ctx).await,
            ReviewCommand::Approve {
                ids,
                min_confidence,
            } => review::run_review_approve_command(ids, *min_confidence, ctx).await,
            ReviewCommand::Reject { ids, note } => {
                review::run_review_reject_command(ids, note.as_deref(), ctx).await
            }
        },
        Command::Import => pipeline::run_import_command(ctx).await,
        Command::Audit(args) => audit::run_audit_command(args, ctx).await,
        Command::Stats => catalog::run_stats_command(ctx).await,
        Command::Sync { command } => sync::run_sync_command(*command, ctx).await,
        Command::Config { command } => match command {
            ConfigCommand::Show => {
                config::run_config_show_command(ctx);
                Ok(ProcessExit::Success)
            }
        },
    }
}
