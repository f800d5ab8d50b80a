//! Sync command handlers: pull from and push to the hosted catalog.

use anyhow::Result;
use parkmenu_core::{Catalog, RemoteCatalog};

use crate::cli::SyncCommand;
use crate::commands::CommandContext;
use crate::{ProcessExit, determine_exit_outcome};

pub async fn run_sync_command(command: SyncCommand, ctx: &CommandContext) -> Result<ProcessExit> {
    let (url, key) = ctx.config.supabase_credentials()?;
    let remote = RemoteCatalog::new(url, key)?.with_retry(ctx.config.retry_policy());
    let catalog = Catalog::new(ctx.open_database().await?);

    match command {
        SyncCommand::Pull => {
            let summary = remote.pull(&catalog).await?;
            println!(
                "Pulled {} parks, {} restaurants, {} menu items, {} nutrition records, {} allergens ({} rows failed)",
                summary.parks,
                summary.restaurants,
                summary.menu_items,
                summary.nutrition,
                summary.allergens,
                summary.failed
            );
            Ok(determine_exit_outcome(summary.stored(), summary.failed))
        }
        SyncCommand::Push => {
            let summary = remote.push(&catalog).await?;
            println!(
                "Pushed {} nutrition records and {} allergens",
                summary.nutrition, summary.allergens
            );
            Ok(ProcessExit::Success)
        }
    }
}
