//! Downhub Core Library
//!
//! This library discovers every tagged release of a hosted repository by
//! walking its paginated tag listing, classifies the archive links it finds,
//! and downloads them concurrently while keeping a JSON manifest of what was
//! discovered.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`http_client`] - Proxy-aware HTTP client construction and reachability probe
//! - [`assets`] - Archive format classification of discovered links
//! - [`crawl`] - Tag page crawler (explicit pagination state machine)
//! - [`download`] - Bounded concurrent download manager with progress bars
//! - [`manifest`] - `output-{repo}.json` manifest persistence
//! - [`input`] - Repository list file reading

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assets;
pub mod crawl;
pub mod download;
pub mod http_client;
pub mod input;
pub mod manifest;
mod user_agent;

// Re-export commonly used types
pub use assets::{ArchiveFormat, AssetClassifier, ClassifiedAssets};
pub use crawl::{
    CrawlError, CrawlOptions, CrawlOutcome, CrawlReport, Crawler, DEFAULT_CRAWL_PARALLELISM,
    DEFAULT_MAX_TAG_PAGES, PageFetcher, RepositoryTarget,
};
pub use download::{
    CancelSignal, DEFAULT_CONCURRENCY, DownloadError, DownloadManager, DownloadOptions,
    DownloadOutcome, DownloadRun, DownloadSummary, EngineError, ProgressMode,
};
pub use http_client::{ClientError, ClientSettings, HttpClientFactory, parse_proxy};
pub use input::{InputError, read_repository_list};
pub use manifest::{Manifest, ManifestError, ManifestWriter};
