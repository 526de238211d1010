//! Commands that drive the list registry against the network and disk.

use std::path::Path;
use std::sync::Arc;

use log::info;
use sf_lists::{
    HttpFetcher, JsonFileEngine, JsonFileStore, ListRegistry, Manifest, RegistryStatus, Settings, ToggleTarget,
    UpdateScheduler,
};

pub fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start tokio runtime: {}", e))
}

pub async fn load_settings(path: Option<&Path>) -> Result<Settings, String> {
    match path {
        Some(path) => Settings::load(path).await.map_err(|e| e.to_string()),
        None => Ok(Settings::default()),
    }
}

async fn open_registry(settings: &Settings) -> Result<ListRegistry, String> {
    let manifest = Manifest::load(&settings.manifest_path).await.map_err(|e| e.to_string())?;
    let fetcher = HttpFetcher::new(settings).map_err(|e| format!("Failed to build HTTP client: {}", e))?;

    Ok(ListRegistry::new(
        manifest,
        settings,
        Arc::new(fetcher),
        Arc::new(JsonFileStore::new(&settings.cache_path)),
        Arc::new(JsonFileEngine::new(&settings.output_path)),
    ))
}

/// Open the registry with persisted state applied.
async fn open_cached_registry(settings: &Settings) -> Result<ListRegistry, String> {
    let mut registry = open_registry(settings).await?;
    registry
        .load_cached()
        .await
        .map_err(|e| format!("Failed to load '{}': {}", settings.cache_path.display(), e))?;
    Ok(registry)
}

pub async fn cmd_refresh(settings: &Settings, list: Option<&str>, force: bool) -> Result<(), String> {
    let mut registry = open_cached_registry(settings).await?;

    match list {
        Some(id) => {
            if registry.list(id).is_none() {
                return Err(format!("Unknown list '{}'", id));
            }
            if !registry.refresh_list(id, force).await {
                return Err(format!("Every source of '{}' failed; cached rules kept", id));
            }
            println!("Refreshed '{}'", id);
        }
        None => {
            let summary = registry.refresh_all(force).await;
            println!("Refreshed {} enabled lists", registry.enabled_lists().len());
            println!("  Updated:      {}", summary.updated);
            println!("  Not modified: {}", summary.not_modified);
            println!("  Failed:       {}", summary.failed);
            match summary.applied_rules {
                Some(count) => println!("  Applied:      {} rules -> '{}'", count, settings.output_path.display()),
                None => return Err("Failed to apply the assembled rule set".to_string()),
            }
        }
    }

    Ok(())
}

pub async fn cmd_status(settings: &Settings, json: bool) -> Result<(), String> {
    let registry = open_cached_registry(settings).await?;
    let status = registry.status();

    if json {
        let text = serde_json::to_string_pretty(&status).map_err(|e| format!("Failed to serialize status: {}", e))?;
        println!("{}", text);
    } else {
        print_status(&status);
    }
    Ok(())
}

fn print_status(status: &RegistryStatus) {
    println!("Filter lists:");
    for list in &status.lists {
        let fetched = list
            .last_fetch
            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "  [{}] {:<24} {:<12} {:>6} rules  fetched {}",
            if list.enabled { "x" } else { " " },
            list.id,
            list.category,
            list.rule_count,
            fetched
        );
    }
    println!();
    let totals = &status.summary;
    println!("Enabled:     {} / {}", totals.enabled_lists, totals.total_lists);
    println!("Rules:       {} / {} ({}%)", totals.total_rules, totals.max_rules, totals.utilization_percent);
}

/// A running `watch` picks the new state up at its next cycle.
pub async fn cmd_toggle(settings: &Settings, target: ToggleTarget, enabled: bool) -> Result<(), String> {
    let mut registry = open_cached_registry(settings).await?;
    let state = if enabled { "enabled" } else { "disabled" };

    let count = registry.toggle(&target, enabled).await;
    match target {
        ToggleTarget::List(id) if count == 0 => return Err(format!("Unknown list '{}'", id)),
        ToggleTarget::List(id) => println!("List '{}' {}", id, state),
        ToggleTarget::Category(category) if count == 0 => {
            return Err(format!("No lists in category '{}'", category))
        }
        ToggleTarget::Category(category) => println!("{} lists in '{}' {}", count, category, state),
    }
    Ok(())
}

/// Initialize, then keep refreshing on the configured interval until Ctrl-C.
pub async fn cmd_watch(settings: &Settings) -> Result<(), String> {
    let mut registry = open_registry(settings).await?;
    let summary = registry.initialize().await;
    info!(
        "Initial refresh: {} updated, {} unchanged, {} failed",
        summary.updated, summary.not_modified, summary.failed
    );

    let (scheduler, handle) = UpdateScheduler::new(registry, settings.update_interval());
    let signal_handle = handle.clone();

    let signals = async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Interrupted, stopping"),
            Err(e) => log::error!("Failed to listen for Ctrl-C: {}", e),
        }
        signal_handle.shutdown().await;
    };

    let (registry, ()) = tokio::join!(scheduler.run(), signals);
    drop(handle);

    let totals = registry.status().summary;
    println!("Stopped with {} enabled lists, {} rules", totals.enabled_lists, totals.total_rules);
    Ok(())
}
