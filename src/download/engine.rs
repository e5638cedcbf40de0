//! Download manager for concurrent archive downloads.
//!
//! Every classified asset becomes one Tokio task. A semaphore permit is
//! acquired in the submitting loop before each spawn, so at most
//! `concurrency` transfers are in flight and tasks start in discovery order.
//! Outcomes travel over a channel to a single aggregator task that owns the
//! counters and is the only writer of the manifest file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::Client;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::cancel::CancelSignal;
use super::error::DownloadError;
use super::filename::filename_from_url;
use super::progress::{AssetProgress, ProgressBoard, ProgressMode};
use super::task::download_asset;
use crate::assets::ClassifiedAssets;
use crate::crawl::RepositoryTarget;
use crate::manifest::{Manifest, ManifestWriter};

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Error type for download manager operations.
///
/// Individual asset failures never surface here; they are counted in the
/// [`DownloadSummary`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },

    /// The destination directory could not be created.
    #[error("cannot create destination directory {path}: {source}")]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,

    /// The aggregator task panicked.
    #[error("outcome aggregator failed: {0}")]
    Aggregator(#[from] tokio::task::JoinError),
}

/// Download manager settings.
#[derive(Debug, Clone, Copy)]
pub struct DownloadOptions {
    /// Maximum transfers in flight.
    pub concurrency: usize,
    /// Whether progress bars are drawn.
    pub progress: ProgressMode,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            progress: ProgressMode::Hidden,
        }
    }
}

/// Result of one asset transfer.
#[derive(Debug)]
pub struct DownloadOutcome {
    /// Source URL.
    pub url: String,
    /// File the body was (or would have been) written to.
    pub destination: PathBuf,
    /// Announced content length, `0` when unknown.
    pub bytes_total: u64,
    /// Failure cause, `None` on success.
    pub error: Option<DownloadError>,
}

impl DownloadOutcome {
    /// Returns true when the archive was written completely.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// Returns true when the transfer was stopped by cancellation.
    #[must_use]
    pub fn cancelled(&self) -> bool {
        self.error.as_ref().is_some_and(DownloadError::is_cancelled)
    }

    fn failed(url: &str, destination: PathBuf, error: DownloadError) -> Self {
        Self {
            url: url.to_string(),
            destination,
            bytes_total: 0,
            error: Some(error),
        }
    }
}

/// Aggregate counters for one run.
///
/// `succeeded + failed == total` once the run returns; cancelled transfers
/// are included in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    total: usize,
    succeeded: usize,
    failed: usize,
    cancelled: usize,
    interrupted: bool,
}

impl DownloadSummary {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Number of assets submitted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of assets written completely.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    /// Number of assets that failed, cancelled ones included.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Number of failed assets that were stopped by cancellation.
    #[must_use]
    pub fn cancelled(&self) -> usize {
        self.cancelled
    }

    /// Returns true if the run was cancelled before every asset finished.
    #[must_use]
    pub fn interrupted(&self) -> bool {
        self.interrupted
    }

    /// Returns true if every asset succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0 && self.succeeded == self.total
    }

    fn record(&mut self, outcome: &DownloadOutcome) {
        if outcome.succeeded() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
            if outcome.cancelled() {
                self.cancelled += 1;
            }
        }
    }

    fn recorded(&self) -> usize {
        self.succeeded + self.failed
    }
}

/// What a call to [`DownloadManager::download_all`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadRun {
    /// No assets were classified; nothing was touched.
    NothingToDownload,
    /// Every asset was attempted.
    Finished {
        /// Aggregate counters.
        summary: DownloadSummary,
        /// Directory the archives were written to.
        destination: PathBuf,
    },
}

impl DownloadRun {
    /// Counters of a finished run.
    #[must_use]
    pub fn summary(&self) -> Option<&DownloadSummary> {
        match self {
            Self::NothingToDownload => None,
            Self::Finished { summary, .. } => Some(summary),
        }
    }
}

/// Bounded concurrent downloader.
#[derive(Debug)]
pub struct DownloadManager {
    client: Client,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    progress: ProgressMode,
}

impl DownloadManager {
    /// Creates a manager that downloads through `client`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] if the concurrency is
    /// outside 1..=100.
    #[instrument(level = "debug", skip(client))]
    pub fn new(client: Client, options: DownloadOptions) -> Result<Self, EngineError> {
        let concurrency = options.concurrency;
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(concurrency, "creating download manager");

        Ok(Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            progress: options.progress,
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Downloads every asset into `destination`.
    ///
    /// Zip archives are submitted first, then tar.gz archives, each in
    /// discovery order. The manifest for `target` is rewritten after each
    /// outcome. With zero assets this returns
    /// [`DownloadRun::NothingToDownload`] without creating the directory,
    /// making requests, or writing a manifest.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CreateDir`] if the destination cannot be
    /// created. Per-asset failures are counted, not returned.
    #[instrument(skip_all, fields(repo = %target.repo_name(), destination = %destination.display()))]
    pub async fn download_all(
        &self,
        target: &RepositoryTarget,
        assets: &ClassifiedAssets,
        destination: &Path,
        manifest: &ManifestWriter,
        cancel: &CancelSignal,
    ) -> Result<DownloadRun, EngineError> {
        let total = assets.total();
        if total == 0 {
            info!("nothing to download");
            return Ok(DownloadRun::NothingToDownload);
        }

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| EngineError::CreateDir {
                path: destination.to_path_buf(),
                source,
            })?;

        info!(total, concurrency = self.concurrency, "starting downloads");

        let board = ProgressBoard::new(self.progress);
        let (tx, rx) = mpsc::channel(total);
        let aggregator = tokio::spawn(aggregate(
            rx,
            total,
            manifest.clone(),
            Manifest::new(target, assets.clone()),
        ));

        let mut workers: Vec<Worker> = Vec::with_capacity(total);

        for (format, raw_url) in assets.iter() {
            let Ok(url) = Url::parse(raw_url) else {
                let outcome = DownloadOutcome::failed(
                    raw_url,
                    destination.to_path_buf(),
                    DownloadError::invalid_url(raw_url),
                );
                let _ = tx.send(outcome).await;
                continue;
            };
            let path = destination.join(filename_from_url(&url));
            let progress = board.add(&path.file_name().map_or_else(
                || raw_url.to_string(),
                |name| name.to_string_lossy().into_owned(),
            ));

            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&self.semaphore).acquire_owned() => {
                    Some(permit.map_err(|_| EngineError::SemaphoreClosed)?)
                }
            };
            let Some(permit) = permit else {
                progress.fail("cancelled");
                let outcome = DownloadOutcome::failed(
                    raw_url,
                    path,
                    DownloadError::cancelled(raw_url),
                );
                let _ = tx.send(outcome).await;
                continue;
            };

            debug!(%format, url = %url, "submitting download");

            let client = self.client.clone();
            let cancel = cancel.clone();
            let tx = tx.clone();
            let task_progress = progress.clone();
            let task_path = path.clone();

            let handle = tokio::spawn(async move {
                // Permit is dropped when this block exits (RAII)
                let _permit = permit;

                let result =
                    download_asset(&client, &url, &task_path, &task_progress, &cancel).await;
                let outcome = match result {
                    Ok(bytes_total) => {
                        task_progress.succeed();
                        DownloadOutcome {
                            url: url.to_string(),
                            destination: task_path,
                            bytes_total,
                            error: None,
                        }
                    }
                    Err(error) => {
                        task_progress.fail(if error.is_cancelled() { "cancelled" } else { "failed" });
                        DownloadOutcome::failed(url.as_str(), task_path, error)
                    }
                };
                let _ = tx.send(outcome).await;
            });

            workers.push(Worker {
                handle,
                url: raw_url.to_string(),
                path,
                progress,
            });
        }

        debug!(task_count = workers.len(), "waiting for downloads to complete");

        for worker in workers {
            if let Err(e) = worker.handle.await {
                warn!(url = %worker.url, error = %e, "download task panicked");
                worker.progress.fail("aborted");
                let outcome = DownloadOutcome::failed(
                    &worker.url,
                    worker.path,
                    DownloadError::task_aborted(&worker.url, e.to_string()),
                );
                let _ = tx.send(outcome).await;
            }
        }
        drop(tx);

        let mut summary = aggregator.await?;
        board.finish();

        summary.interrupted = cancel.is_cancelled() && summary.cancelled > 0;

        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed,
            cancelled = summary.cancelled,
            destination = %destination.display(),
            "downloads complete"
        );

        Ok(DownloadRun::Finished {
            summary,
            destination: destination.to_path_buf(),
        })
    }
}

struct Worker {
    handle: JoinHandle<()>,
    url: String,
    path: PathBuf,
    progress: AssetProgress,
}

/// Owns the counters and the manifest file for one run.
async fn aggregate(
    mut outcomes: mpsc::Receiver<DownloadOutcome>,
    total: usize,
    writer: ManifestWriter,
    manifest: Manifest,
) -> DownloadSummary {
    let mut summary = DownloadSummary::new(total);

    while let Some(outcome) = outcomes.recv().await {
        match &outcome.error {
            None => info!(
                url = %outcome.url,
                path = %outcome.destination.display(),
                bytes = outcome.bytes_total,
                "download finished"
            ),
            Some(error) => warn!(
                url = %outcome.url,
                path = %outcome.destination.display(),
                error = %error,
                "download failed"
            ),
        }
        summary.record(&outcome);

        if let Err(e) = writer.persist(&manifest).await {
            warn!(error = %e, "failed to write manifest");
        }
    }

    // Every submitted asset reports exactly once; anything missing is a failure.
    let missing = total.saturating_sub(summary.recorded());
    if missing > 0 {
        warn!(missing, "downloads ended without reporting");
        summary.failed += missing;
    }

    summary
}
