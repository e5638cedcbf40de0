//! Application configuration loading for CLI defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use downhub::{ArchiveFormat, DEFAULT_CONCURRENCY, DEFAULT_CRAWL_PARALLELISM, DEFAULT_MAX_TAG_PAGES};
use serde::Deserialize;
use serde::de::IgnoredAny;

/// TOML-backed file configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub defaults: DefaultsSection,
    pub download: DownloadSection,
    pub logging: LoggingSection,
    pub repositories: Vec<RepositoryEntry>,
    file_filters: LegacyKey,
    advanced: LegacyKey,
}

/// Key carried over from older config files; accepted, then ignored.
type LegacyKey = Option<IgnoredAny>;

/// `[defaults]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsSection {
    /// Root of all downloaded data.
    pub base_data_dir: PathBuf,
    /// Subdirectory of `base_data_dir` holding archives.
    pub source_dir: PathBuf,
    /// Download worker pool size.
    pub max_concurrent_downloads: usize,
    /// Tag page fetch cap shared by all crawls of a run.
    pub crawl_parallelism: usize,
    /// Tag page ceiling per repository.
    pub max_tag_pages: usize,
    /// Forward proxy.
    pub proxy: Option<String>,
    /// Archive formats to keep (`zip`, `tar.gz`).
    pub archive_formats: Vec<String>,
    /// Directory for `output-{repo}.json`.
    pub manifest_dir: PathBuf,
    docs_dir: LegacyKey,
    docs_path: LegacyKey,
}

impl Default for DefaultsSection {
    fn default() -> Self {
        Self {
            base_data_dir: PathBuf::from("data"),
            source_dir: PathBuf::from("source"),
            max_concurrent_downloads: DEFAULT_CONCURRENCY,
            crawl_parallelism: DEFAULT_CRAWL_PARALLELISM,
            max_tag_pages: DEFAULT_MAX_TAG_PAGES,
            proxy: None,
            archive_formats: ArchiveFormat::ALL.iter().map(ToString::to_string).collect(),
            manifest_dir: PathBuf::from("."),
            docs_dir: None,
            docs_path: None,
        }
    }
}

/// `[download]`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DownloadSection {
    #[serde(alias = "timeout")]
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: Option<String>,
    retries: LegacyKey,
    retry_delay: LegacyKey,
}

impl Default for DownloadSection {
    fn default() -> Self {
        Self {
            timeout_secs: downhub::http_client::DEFAULT_TIMEOUT_SECS,
            connect_timeout_secs: downhub::http_client::DEFAULT_CONNECT_TIMEOUT_SECS,
            user_agent: None,
            retries: None,
            retry_delay: None,
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: Option<String>,
    format: LegacyKey,
    output: LegacyKey,
}

/// One `[[repositories]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryEntry {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub download_source: bool,
    #[serde(default)]
    pub(crate) download_docs: LegacyKey,
    #[serde(default)]
    pub(crate) output_dir: LegacyKey,
    #[serde(default)]
    pub(crate) docs_path: LegacyKey,
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        let defaults = &self.defaults;
        validate_range(
            "defaults.max_concurrent_downloads",
            defaults.max_concurrent_downloads,
            1,
            100,
        )?;
        validate_range("defaults.crawl_parallelism", defaults.crawl_parallelism, 1, 100)?;
        validate_range("defaults.max_tag_pages", defaults.max_tag_pages, 1, 10_000)?;

        if defaults.archive_formats.is_empty() {
            bail!("Invalid config value for `defaults.archive_formats`: []. Expected at least one of zip, tar.gz");
        }
        self.archive_formats()?;

        if let Some(proxy) = &defaults.proxy
            && proxy.trim().is_empty()
        {
            bail!("Invalid config value for `defaults.proxy`: empty string. Remove the key to connect directly");
        }

        validate_timeout_secs("download.timeout_secs", self.download.timeout_secs)?;
        validate_timeout_secs("download.connect_timeout_secs", self.download.connect_timeout_secs)?;

        if let Some(level) = &self.logging.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!("Invalid config value for `logging.level`: {level}. Expected one of: {}", LOG_LEVELS.join(", "));
        }

        for (index, repo) in self.repositories.iter().enumerate() {
            if repo.url.trim().is_empty() {
                bail!("Invalid config value for `repositories[{index}].url`: empty string");
            }
        }

        Ok(())
    }

    /// Parsed archive format allow-list.
    pub fn archive_formats(&self) -> Result<Vec<ArchiveFormat>> {
        self.defaults
            .archive_formats
            .iter()
            .map(|raw| {
                raw.parse::<ArchiveFormat>()
                    .map_err(|reason| anyhow::anyhow!("Invalid config value for `defaults.archive_formats`: {reason}"))
            })
            .collect()
    }

    /// Keys from older config files that were accepted but have no effect.
    pub fn ignored_legacy_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        let mut note = |key: String, value: &LegacyKey| {
            if value.is_some() {
                keys.push(key);
            }
        };

        note("file_filters".into(), &self.file_filters);
        note("advanced".into(), &self.advanced);
        note("defaults.docs_dir".into(), &self.defaults.docs_dir);
        note("defaults.docs_path".into(), &self.defaults.docs_path);
        note("download.retries".into(), &self.download.retries);
        note("download.retry_delay".into(), &self.download.retry_delay);
        note("logging.format".into(), &self.logging.format);
        note("logging.output".into(), &self.logging.output);
        for (index, repo) in self.repositories.iter().enumerate() {
            note(format!("repositories[{index}].download_docs"), &repo.download_docs);
            note(format!("repositories[{index}].output_dir"), &repo.output_dir);
            note(format!("repositories[{index}].docs_path"), &repo.docs_path);
        }

        keys
    }

    /// Repository URLs marked `download_source = true`.
    pub fn source_repositories(&self) -> Vec<String> {
        self.repositories
            .iter()
            .filter(|repo| repo.download_source)
            .map(|repo| repo.url.trim().to_string())
            .collect()
    }
}

fn validate_range(field: &str, value: usize, min: usize, max: usize) -> Result<()> {
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

fn validate_timeout_secs(field: &str, value: u64) -> Result<()> {
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Effective file config (defaults when no file was read).
    pub config: FileConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/downhub/config.toml`
/// 2. `$HOME/.config/downhub/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_path_from(env_var_non_empty_os("XDG_CONFIG_HOME"), env_var_non_empty_os("HOME"))
}

fn config_path_from(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
    if let Some(xdg_config_home) = xdg_config_home {
        return Some(PathBuf::from(xdg_config_home).join("downhub").join("config.toml"));
    }
    let home = home?;
    Some(PathBuf::from(home).join(".config").join("downhub").join("config.toml"))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the explicit config file, or the default one if present.
///
/// A missing default file yields defaults; a missing explicit file is an
/// error.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = load_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config,
            loaded_from_file: true,
        });
    }

    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_file_config(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => Ok(LoadedConfig {
            path,
            config: FileConfig::default(),
            loaded_from_file: false,
        }),
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
