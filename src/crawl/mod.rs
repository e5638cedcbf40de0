//! Tag discovery crawler.
//!
//! Walks `{base}/tags`, then `{base}/tags?after={last tag}` page by page,
//! feeding every release archive link to the classifier. The walk is an
//! explicit state machine:
//!
//! ```text
//! FetchingPage -> ExtractingLinks -> DecidingNextPage -> FetchingPage ...
//!       |                                   |
//!       v                                   v
//!    Failed                               Done
//! ```
//!
//! The crawl stops when the cursor no longer advances: the page just
//! processed was already the page after its own last tag, the page had no
//! tag heading, or the next cursor was visited before. A page ceiling
//! bounds the walk regardless of what the site serves.
//!
//! [`Crawler::crawl`] resolves only after the last page visit has finished,
//! so the returned [`CrawlReport`] is complete and safe to hand to the
//! download manager.

mod error;
mod fetcher;
mod page;
mod target;

use std::collections::HashSet;

use futures_util::future::join_all;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::assets::{AssetClassifier, ClassifiedAssets};

pub use error::CrawlError;
pub use fetcher::{DEFAULT_CRAWL_PARALLELISM, PageFetcher};
pub use target::RepositoryTarget;

use target::cursor_of;

/// Default ceiling on tag pages visited per repository.
pub const DEFAULT_MAX_TAG_PAGES: usize = 500;

/// Crawl settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Maximum tag pages visited per repository.
    pub max_pages: usize,
    /// Classifier (with its format allow-list) applied to every link.
    pub classifier: AssetClassifier,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_TAG_PAGES,
            classifier: AssetClassifier::default(),
        }
    }
}

/// How a crawl ended.
#[derive(Debug)]
pub enum CrawlOutcome {
    /// The cursor stopped advancing.
    Completed,
    /// A page visit failed; assets found before it are kept.
    Truncated(CrawlError),
    /// The page ceiling was hit before the cursor stopped advancing.
    PageLimitReached,
}

impl CrawlOutcome {
    /// Returns true for [`CrawlOutcome::Completed`].
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Result of crawling one repository.
#[derive(Debug)]
pub struct CrawlReport {
    /// The target, with its final `last_seen_tag`.
    pub target: RepositoryTarget,
    /// Every classified archive link, in discovery order.
    pub assets: ClassifiedAssets,
    /// Number of tag pages requested.
    pub pages_visited: usize,
    /// How the crawl ended.
    pub outcome: CrawlOutcome,
}

enum CrawlState {
    FetchingPage { url: Url },
    ExtractingLinks { url: Url, body: String },
    DecidingNextPage { url: Url, page_tag: Option<String> },
    Done,
    Failed(CrawlError),
}

/// Crawls tag listings through a shared [`PageFetcher`].
#[derive(Debug, Clone)]
pub struct Crawler {
    fetcher: PageFetcher,
    options: CrawlOptions,
}

impl Crawler {
    /// Creates a crawler.
    #[must_use]
    pub fn new(fetcher: PageFetcher, options: CrawlOptions) -> Self {
        Self { fetcher, options }
    }

    /// Crawls every tag page of `target`.
    ///
    /// Page failures do not produce an error: they end the crawl with
    /// [`CrawlOutcome::Truncated`] and whatever was classified so far.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Pattern`] if the archive link pattern for the
    /// target cannot be built. No page is fetched in that case.
    #[instrument(skip(self, target), fields(repo = %target.repo_name()))]
    pub async fn crawl(&self, mut target: RepositoryTarget) -> Result<CrawlReport, CrawlError> {
        let pattern = target.archive_link_pattern()?;
        let mut assets = ClassifiedAssets::new();
        let mut visited: HashSet<Option<String>> = HashSet::new();
        let mut pages_visited = 0usize;

        info!(url = %target.base_url(), "crawl started");

        let mut state = CrawlState::FetchingPage {
            url: target.tags_url(),
        };
        let outcome = loop {
            state = match state {
                CrawlState::FetchingPage { url } => {
                    if pages_visited >= self.options.max_pages {
                        warn!(
                            max_pages = self.options.max_pages,
                            next = %url,
                            "tag page limit reached, stopping crawl"
                        );
                        break CrawlOutcome::PageLimitReached;
                    }
                    pages_visited += 1;
                    visited.insert(cursor_of(&url));
                    info!(page = pages_visited, url = %url, "visiting tag page");

                    match self.fetcher.fetch(&url).await {
                        Ok(body) => CrawlState::ExtractingLinks { url, body },
                        Err(e) => CrawlState::Failed(e),
                    }
                }
                CrawlState::ExtractingLinks { url, body } => {
                    let page = page::extract(&body, &url, &pattern);
                    let classified = page
                        .links
                        .iter()
                        .filter(|link| self.options.classifier.classify(link, &mut assets).is_some())
                        .count();
                    debug!(
                        links = page.links.len(),
                        classified,
                        tag = ?page.last_tag,
                        "extracted tag page"
                    );
                    if let Some(tag) = &page.last_tag {
                        target.set_last_seen_tag(tag.clone());
                    }
                    CrawlState::DecidingNextPage {
                        url,
                        page_tag: page.last_tag,
                    }
                }
                CrawlState::DecidingNextPage { url, page_tag } => {
                    decide_next_page(&target, &url, page_tag, &visited)
                }
                CrawlState::Done => break CrawlOutcome::Completed,
                CrawlState::Failed(error) => {
                    warn!(error = %error, "tag page visit failed, keeping assets found so far");
                    break CrawlOutcome::Truncated(error);
                }
            };
        };

        info!(
            zip = assets.zip().len(),
            tar_gz = assets.tar_gz().len(),
            pages = pages_visited,
            last_tag = ?target.last_seen_tag(),
            complete = outcome.is_complete(),
            "crawl finished"
        );

        Ok(CrawlReport {
            target,
            assets,
            pages_visited,
            outcome,
        })
    }

    /// Crawls several repositories concurrently. Page requests across all
    /// of them share the fetcher's parallelism cap. Reports come back in
    /// input order.
    pub async fn crawl_all(
        &self,
        targets: Vec<RepositoryTarget>,
    ) -> Vec<Result<CrawlReport, CrawlError>> {
        info!(
            repositories = targets.len(),
            parallelism = self.fetcher.parallelism(),
            "crawling tag pages"
        );
        join_all(targets.into_iter().map(|target| self.crawl(target))).await
    }
}

fn decide_next_page(
    target: &RepositoryTarget,
    page_url: &Url,
    page_tag: Option<String>,
    visited: &HashSet<Option<String>>,
) -> CrawlState {
    let Some(tag) = page_tag else {
        debug!(url = %page_url, "no tag heading on page, nothing more to discover");
        return CrawlState::Done;
    };

    if cursor_of(page_url).as_deref() == Some(tag.as_str()) {
        debug!(url = %page_url, %tag, "cursor did not advance");
        return CrawlState::Done;
    }
    if visited.contains(&Some(tag.clone())) {
        debug!(%tag, "next tag page already visited");
        return CrawlState::Done;
    }

    let next = target.tags_after_url(&tag);
    info!(next = %next, "next tag page");
    CrawlState::FetchingPage { url: next }
}
