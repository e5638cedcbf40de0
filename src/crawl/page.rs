//! Link and tag-label extraction from one tag listing page.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::trace;
use url::Url;

/// Anchors that carry release archive downloads on a tag listing.
#[allow(clippy::expect_used)]
static ARCHIVE_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a.Link--muted[href]").expect("archive link selector is valid") // Static pattern, safe to panic
});

/// Tag heading links; the label of the last one is the pagination cursor.
#[allow(clippy::expect_used)]
static TAG_HEADING_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h2.f4.d-inline a.Link--primary").expect("tag heading selector is valid") // Static pattern, safe to panic
});

/// What one tag page yielded.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TagPage {
    /// Matching archive links, resolved to absolute URLs, in page order.
    pub(crate) links: Vec<String>,
    /// Label of the last tag heading on the page.
    pub(crate) last_tag: Option<String>,
}

/// Extracts archive links matching `pattern` and the last tag label.
///
/// Hrefs are resolved against `page_url`. Hrefs that cannot be resolved
/// and headings with blank text are skipped.
pub(crate) fn extract(html: &str, page_url: &Url, pattern: &Regex) -> TagPage {
    let document = Html::parse_document(html);

    let links = document
        .select(&ARCHIVE_LINK_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter(|href| pattern.is_match(href))
        .filter_map(|href| match page_url.join(href) {
            Ok(absolute) => Some(absolute.to_string()),
            Err(e) => {
                trace!(%href, error = %e, "skipping unresolvable archive link");
                None
            }
        })
        .collect();

    let last_tag = document
        .select(&TAG_HEADING_SELECTOR)
        .map(|heading| heading.text().collect::<String>().trim().to_string())
        .filter(|label| !label.is_empty())
        .last();

    TagPage { links, last_tag }
}
