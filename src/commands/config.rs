//! Config command handler: show effective configuration.

use crate::app_config::mask_secret;
use crate::commands::CommandContext;

pub fn run_config_show_command(ctx: &CommandContext) {
    let loaded = &ctx.loaded;
    let effective = &ctx.config;

    let resolved_path = loaded.path.as_ref().map_or_else(
        || "<unresolved>".to_string(),
        |path| path.display().to_string(),
    );
    println!("config_path = {resolved_path}");
    println!(
        "config_file = {}",
        if loaded.loaded_from_file {
            "loaded"
        } else {
            "not found (using defaults)"
        }
    );
    println!("db_path = {}", effective.db_path.display());
    println!("rate_limit = {}", effective.rate_limit);
    println!("max_retries = {}", effective.max_retries);
    println!("item_match_threshold = {}", effective.thresholds.item);
    println!(
        "restaurant_match_threshold = {}",
        effective.thresholds.restaurant
    );
    println!("estimate_k = {}", effective.estimator.k);
    println!("min_similarity = {}", effective.estimator.min_similarity);
    println!(
        "supabase_url = {}",
        effective.supabase_url.as_deref().unwrap_or("<unset>")
    );
    println!(
        "supabase_key = {}",
        effective
            .supabase_key
            .as_deref()
            .map_or_else(|| "<unset>".to_string(), mask_secret)
    );
}
