//! Config command handlers: show effective configuration.

use anyhow::Result;

use crate::app::config_manager::ResolvedSettings;
use crate::app_config::LoadedConfig;

pub fn run_config_show_command(loaded: &LoadedConfig, settings: &ResolvedSettings) -> Result<()> {
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
    println!("source_root = {}", settings.source_root.display());
    println!("manifest_dir = {}", settings.manifest_dir.display());
    println!("proxy = {}", settings.proxy.as_deref().unwrap_or("<none>"));
    println!("max_concurrent_downloads = {}", settings.concurrency);
    println!("crawl_parallelism = {}", settings.crawl_parallelism);
    println!("max_tag_pages = {}", settings.max_tag_pages);
    println!(
        "archive_formats = {}",
        settings
            .archive_formats
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("timeout_secs = {}", settings.timeout.as_secs());
    println!("connect_timeout_secs = {}", settings.connect_timeout.as_secs());
    println!(
        "log_level = {}",
        settings.log_level.as_deref().unwrap_or("info")
    );
    println!("repositories = {}", loaded.config.repositories.len());
    for repo in &loaded.config.repositories {
        println!(
            "repository.{} = {} (download_source = {})",
            repo.name, repo.url, repo.download_source
        );
    }

    Ok(())
}
