//! Repository target: the base URL being crawled and its pagination cursor.

use std::path::PathBuf;

use regex::Regex;
use url::Url;

use super::CrawlError;

/// Query parameter carrying the tag pagination cursor.
pub(crate) const CURSOR_PARAM: &str = "after";

/// A repository whose tags are being discovered.
///
/// Created once per repository from user input. `last_seen_tag` advances as
/// tag pages are processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryTarget {
    base_url: Url,
    owner: Option<String>,
    repo_name: String,
    last_seen_tag: Option<String>,
}

impl RepositoryTarget {
    /// Parses and normalizes a repository URL.
    ///
    /// Trailing slashes and a trailing `.git` are removed; query and
    /// fragment are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidRepositoryUrl`] when the input is not an
    /// absolute `http`/`https` URL with at least one path segment.
    pub fn parse(raw: &str) -> Result<Self, CrawlError> {
        let trimmed = raw.trim();
        let mut url =
            Url::parse(trimmed).map_err(|e| CrawlError::invalid_repository(trimmed, e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(CrawlError::invalid_repository(
                trimmed,
                format!("unsupported scheme `{}`", url.scheme()),
            ));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(CrawlError::invalid_repository(trimmed, "missing host"));
        }

        let segments: Vec<String> = url
            .path_segments()
            .map(|segments| {
                segments
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let Some((last, rest)) = segments.split_last() else {
            return Err(CrawlError::invalid_repository(trimmed, "missing repository path"));
        };
        let repo_name = last.strip_suffix(".git").unwrap_or(last).to_string();
        if repo_name.is_empty() {
            return Err(CrawlError::invalid_repository(trimmed, "empty repository name"));
        }

        let mut path: Vec<&str> = rest.iter().map(String::as_str).collect();
        path.push(&repo_name);
        url.set_path(&format!("/{}", path.join("/")));
        url.set_query(None);
        url.set_fragment(None);

        Ok(Self {
            base_url: url,
            owner: rest.last().cloned(),
            repo_name,
            last_seen_tag: None,
        })
    }

    /// Normalized base URL, e.g. `https://github.com/owner/repo`.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Final path segment of the base URL.
    #[must_use]
    pub fn repo_name(&self) -> &str {
        &self.repo_name
    }

    /// Path segment before the repository name, when present.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Label of the last tag heading processed so far.
    #[must_use]
    pub fn last_seen_tag(&self) -> Option<&str> {
        self.last_seen_tag.as_deref()
    }

    pub(crate) fn set_last_seen_tag(&mut self, tag: String) {
        self.last_seen_tag = Some(tag);
    }

    /// First tag listing page: `{base}/tags`.
    #[must_use]
    pub fn tags_url(&self) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push("tags");
        }
        url
    }

    /// Tag listing page after `tag`: `{base}/tags?after={tag}`, with the
    /// tag percent-encoded by the query serializer.
    #[must_use]
    pub fn tags_after_url(&self, tag: &str) -> Url {
        let mut url = self.tags_url();
        url.query_pairs_mut().append_pair(CURSOR_PARAM, tag);
        url
    }

    /// Root of the hosting site, used for the reachability probe.
    #[must_use]
    pub fn origin_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/");
        url
    }

    /// Pattern matching release archive links of this repository: an
    /// optional `scheme://host` of this repository's own site, the escaped
    /// base path, `/archive/refs/tags/`, then any tag. Anchored, so links of
    /// other hosts or of repositories nested under another path never match.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Pattern`] if the pattern fails to compile.
    pub fn archive_link_pattern(&self) -> Result<Regex, CrawlError> {
        let mut authority = self.base_url.host_str().unwrap_or_default().to_string();
        if let Some(port) = self.base_url.port() {
            authority.push_str(&format!(":{port}"));
        }
        let authority = regex::escape(&authority);
        let base_path = regex::escape(self.base_url.path());
        Ok(Regex::new(&format!(
            "^(?:https?://{authority})?{base_path}/archive/refs/tags/.+"
        ))?)
    }

    /// Relative destination directory: `owner/repo`, or `repo` alone.
    #[must_use]
    pub fn relative_dir(&self) -> PathBuf {
        let mut dir = PathBuf::new();
        if let Some(owner) = &self.owner {
            dir.push(owner);
        }
        dir.push(&self.repo_name);
        dir
    }
}

/// Decoded pagination cursor of a tag page URL, if it has one.
pub(crate) fn cursor_of(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == CURSOR_PARAM)
        .map(|(_, value)| value.into_owned())
}
