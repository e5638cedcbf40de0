//! Page fetch scheduler with a shared parallelism cap.

use std::sync::Arc;

use reqwest::Client;
use tokio::sync::Semaphore;
use tracing::{debug, instrument};
use url::Url;

use super::CrawlError;

/// Default maximum number of tag pages fetched at once.
pub const DEFAULT_CRAWL_PARALLELISM: usize = 20;

/// Fetches tag listing pages, never more than `parallelism` at a time.
///
/// Clones share the same permit pool, so several crawls driven from one
/// fetcher (a batch run) respect a single cap.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    permits: Arc<Semaphore>,
    parallelism: usize,
}

impl PageFetcher {
    /// Creates a fetcher. A parallelism of zero is raised to one.
    #[must_use]
    pub fn new(client: Client, parallelism: usize) -> Self {
        let parallelism = parallelism.max(1);
        Self {
            client,
            permits: Arc::new(Semaphore::new(parallelism)),
            parallelism,
        }
    }

    /// Configured parallelism cap.
    #[must_use]
    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Fetches `url` and returns its body.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Network`] on transport failure,
    /// [`CrawlError::HttpStatus`] on a non-success status, and
    /// [`CrawlError::SchedulerClosed`] if the permit pool was closed.
    #[instrument(level = "debug", skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| CrawlError::SchedulerClosed)?;

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| CrawlError::network(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::http_status(url.as_str(), status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlError::network(url.as_str(), e))?;
        debug!(bytes = body.len(), "fetched tag page");
        Ok(body)
    }
}
