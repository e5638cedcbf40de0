//! Concurrent archive downloads.
//!
//! This module streams classified release archives to disk through a
//! bounded pool of Tokio tasks, with one progress bar per asset.
//!
//! # Features
//!
//! - Bounded concurrency (semaphore permits, FIFO submission)
//! - Streaming writes, partial files kept on failure
//! - Byte bars for known lengths, spinners otherwise
//! - Single-writer manifest updates after every outcome
//! - Cooperative cancellation through [`CancelSignal`]
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use downhub::{CancelSignal, ClassifiedAssets, DownloadManager, DownloadOptions, ManifestWriter, RepositoryTarget};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let target = RepositoryTarget::parse("https://github.com/owner/repo")?;
//! let mut assets = ClassifiedAssets::new();
//! assets.classify("https://github.com/owner/repo/archive/refs/tags/v1.0.zip");
//!
//! let manager = DownloadManager::new(reqwest::Client::new(), DownloadOptions::default())?;
//! let run = manager
//!     .download_all(&target, &assets, Path::new("./data"), &ManifestWriter::new("."), &CancelSignal::new())
//!     .await?;
//! println!("{run:?}");
//! # Ok(())
//! # }
//! ```

mod cancel;
mod engine;
mod error;
mod filename;
mod progress;
mod task;

pub use cancel::CancelSignal;
pub use engine::{
    DEFAULT_CONCURRENCY, DownloadManager, DownloadOptions, DownloadOutcome, DownloadRun,
    DownloadSummary, EngineError,
};
pub use error::DownloadError;
pub use progress::ProgressMode;
