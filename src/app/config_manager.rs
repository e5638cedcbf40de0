//! Configuration lifecycle: load file config, merge CLI overrides, resolve component settings.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use downhub::{
    ArchiveFormat, AssetClassifier, ClientSettings, CrawlOptions, DownloadOptions, ProgressMode,
};

use crate::app_config::{FileConfig, LoadedConfig, load_config};
use crate::cli::RunArgs;

/// Effective settings after CLI flags are applied over the file config.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedSettings {
    pub(crate) proxy: Option<String>,
    pub(crate) concurrency: usize,
    pub(crate) crawl_parallelism: usize,
    pub(crate) max_tag_pages: usize,
    pub(crate) archive_formats: Vec<ArchiveFormat>,
    /// `{base_data_dir}/{source_dir}`; repositories land below it.
    pub(crate) source_root: PathBuf,
    pub(crate) manifest_dir: PathBuf,
    pub(crate) timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) user_agent: Option<String>,
    pub(crate) log_level: Option<String>,
}

impl ResolvedSettings {
    pub(crate) fn client_settings(&self) -> ClientSettings {
        let mut settings = ClientSettings {
            proxy: self.proxy.clone(),
            connect_timeout: self.connect_timeout,
            timeout: Some(self.timeout),
            ..ClientSettings::default()
        };
        if let Some(user_agent) = &self.user_agent {
            settings.user_agent.clone_from(user_agent);
        }
        settings
    }

    pub(crate) fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_pages: self.max_tag_pages,
            classifier: AssetClassifier::new(self.archive_formats.clone()),
        }
    }

    pub(crate) fn download_options(&self, progress: ProgressMode) -> DownloadOptions {
        DownloadOptions {
            concurrency: self.concurrency,
            progress,
        }
    }
}

/// Loads the configuration file named by `--config` (or the default one)
/// and merges CLI overrides into it.
pub(crate) fn resolve_config(args: &RunArgs) -> Result<(LoadedConfig, ResolvedSettings)> {
    let loaded = load_config(args.config.as_deref())?;
    let settings = merge(args, &loaded.config)?;
    Ok((loaded, settings))
}

pub(crate) fn merge(args: &RunArgs, config: &FileConfig) -> Result<ResolvedSettings> {
    let defaults = &config.defaults;
    let base_data_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| defaults.base_data_dir.clone());

    Ok(ResolvedSettings {
        proxy: args.proxy.clone().or_else(|| defaults.proxy.clone()),
        concurrency: args
            .concurrency
            .map_or(defaults.max_concurrent_downloads, usize::from),
        crawl_parallelism: defaults.crawl_parallelism,
        max_tag_pages: defaults.max_tag_pages,
        archive_formats: config.archive_formats()?,
        source_root: base_data_dir.join(&defaults.source_dir),
        manifest_dir: defaults.manifest_dir.clone(),
        timeout: Duration::from_secs(config.download.timeout_secs),
        connect_timeout: Duration::from_secs(config.download.connect_timeout_secs),
        user_agent: config.download.user_agent.clone(),
        log_level: config.logging.level.clone(),
    })
}
