//! Error types for the tag crawler.

use thiserror::Error;

/// Errors raised while preparing or running a tag crawl.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The repository URL cannot be crawled.
    #[error("invalid repository URL {url:?}: {reason}")]
    InvalidRepositoryUrl {
        /// The rejected input.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Network-level failure while fetching a tag page.
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The page URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The tag page answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The page URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The archive link pattern for the repository could not be compiled.
    #[error("invalid archive link pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The page fetch scheduler was shut down.
    #[error("page fetch scheduler closed unexpectedly")]
    SchedulerClosed,
}

impl CrawlError {
    /// Creates an invalid repository URL error.
    pub fn invalid_repository(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRepositoryUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}
