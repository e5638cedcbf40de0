//! Archive format classification of discovered release links.
//!
//! Links are sorted into two append-only sequences by filename suffix.
//! Nothing is normalized or deduplicated: a link seen on two pages is
//! recorded twice, and discovery order is kept because it drives download
//! and progress-bar ordering.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Container formats the tool knows how to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    /// `.zip` archives.
    Zip,
    /// `.tar.gz` archives.
    TarGz,
}

impl ArchiveFormat {
    /// Every supported format, in download order.
    pub const ALL: [ArchiveFormat; 2] = [ArchiveFormat::Zip, ArchiveFormat::TarGz];

    /// Filename suffix that identifies this format.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Zip => ".zip",
            Self::TarGz => ".tar.gz",
        }
    }

    /// Returns the format a URL belongs to, judged by its suffix only.
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|format| url.ends_with(format.suffix()))
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.suffix()[1..])
    }
}

impl FromStr for ArchiveFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "zip" => Ok(Self::Zip),
            "tar.gz" | "tgz" => Ok(Self::TarGz),
            other => Err(format!("unsupported archive format `{other}` (expected zip or tar.gz)")),
        }
    }
}

/// Classified archive links for one repository.
///
/// Serialized as the `download_sources` object of the manifest; an empty
/// list is omitted entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedAssets {
    #[serde(rename = "tar_list", default, skip_serializing_if = "Vec::is_empty")]
    tar_gz: Vec<String>,
    #[serde(rename = "zip_list", default, skip_serializing_if = "Vec::is_empty")]
    zip: Vec<String>,
}

impl ClassifiedAssets {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the suffix rule to `url` and appends it to the matching
    /// sequence. Returns the format it was filed under, or `None` if the
    /// URL was ignored.
    pub fn classify(&mut self, url: &str) -> Option<ArchiveFormat> {
        let format = ArchiveFormat::from_url(url)?;
        self.push(format, url);
        Some(format)
    }

    fn push(&mut self, format: ArchiveFormat, url: &str) {
        trace!(%url, %format, "classified archive link");
        match format {
            ArchiveFormat::Zip => self.zip.push(url.to_string()),
            ArchiveFormat::TarGz => self.tar_gz.push(url.to_string()),
        }
    }

    /// `.zip` links in discovery order.
    #[must_use]
    pub fn zip(&self) -> &[String] {
        &self.zip
    }

    /// `.tar.gz` links in discovery order.
    #[must_use]
    pub fn tar_gz(&self) -> &[String] {
        &self.tar_gz
    }

    /// Total number of classified links, duplicates included.
    #[must_use]
    pub fn total(&self) -> usize {
        self.zip.len() + self.tar_gz.len()
    }

    /// All links in download order: every zip first, then every tar.gz.
    pub fn iter(&self) -> impl Iterator<Item = (ArchiveFormat, &str)> {
        self.zip
            .iter()
            .map(|url| (ArchiveFormat::Zip, url.as_str()))
            .chain(self.tar_gz.iter().map(|url| (ArchiveFormat::TarGz, url.as_str())))
    }
}

/// Classifier restricted to an allow-list of formats.
///
/// Links whose format is not allowed are dropped as if they had an
/// unknown suffix.
#[derive(Debug, Clone)]
pub struct AssetClassifier {
    allowed: Vec<ArchiveFormat>,
}

impl Default for AssetClassifier {
    fn default() -> Self {
        Self::new(ArchiveFormat::ALL.to_vec())
    }
}

impl AssetClassifier {
    /// Creates a classifier accepting only `allowed`. An empty list means
    /// every supported format.
    #[must_use]
    pub fn new(allowed: Vec<ArchiveFormat>) -> Self {
        if allowed.is_empty() {
            return Self::default();
        }
        Self { allowed }
    }

    /// Formats this classifier accepts.
    #[must_use]
    pub fn allowed(&self) -> &[ArchiveFormat] {
        &self.allowed
    }

    /// Classifies `url` into `assets` if its format is allowed.
    pub fn classify(&self, url: &str, assets: &mut ClassifiedAssets) -> Option<ArchiveFormat> {
        let format = ArchiveFormat::from_url(url).filter(|f| self.allowed.contains(f))?;
        assets.push(format, url);
        Some(format)
    }
}
