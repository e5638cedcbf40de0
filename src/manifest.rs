//! `output-{repo}.json` manifest persistence.
//!
//! The manifest records what the crawl discovered for one repository:
//!
//! ```json
//! {"repo_name":"r","repo_url":"https://github.com/o/r","download_sources":{"tar_list":[...],"zip_list":[...]}}
//! ```
//!
//! It is overwritten in place on every write. Writes are not atomic; the
//! download manager serializes them through its aggregator task.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::assets::ClassifiedAssets;
use crate::crawl::RepositoryTarget;

/// Errors produced while writing or reading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest could not be encoded.
    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The manifest file could not be written or read.
    #[error("manifest IO error at {path}: {source}")]
    Io {
        /// Manifest path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a manifest.
    #[error("invalid manifest at {path}: {source}")]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// The underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// Snapshot of one repository's discovered archives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Final path segment of the repository URL.
    pub repo_name: String,
    /// Normalized repository URL.
    pub repo_url: String,
    /// Classified archive links.
    pub download_sources: ClassifiedAssets,
}

impl Manifest {
    /// Builds a manifest for `target`.
    #[must_use]
    pub fn new(target: &RepositoryTarget, assets: ClassifiedAssets) -> Self {
        Self {
            repo_name: target.repo_name().to_string(),
            repo_url: target.base_url().to_string(),
            download_sources: assets,
        }
    }
}

/// Writes manifests into one directory.
#[derive(Debug, Clone)]
pub struct ManifestWriter {
    dir: PathBuf,
}

impl ManifestWriter {
    /// Creates a writer targeting `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the manifest for `repo_name`.
    #[must_use]
    pub fn path_for(&self, repo_name: &str) -> PathBuf {
        self.dir.join(format!("output-{repo_name}.json"))
    }

    /// Overwrites the manifest for `manifest.repo_name`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError`] on serialization or IO failure.
    pub async fn persist(&self, manifest: &Manifest) -> Result<PathBuf, ManifestError> {
        let path = self.path_for(&manifest.repo_name);

        let mut bytes = serde_json::to_vec(manifest)?;
        bytes.push(b'\n');

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ManifestError::Io {
                path: self.dir.clone(),
                source,
            })?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.clone(),
                source,
            })?;

        debug!(path = %path.display(), "manifest written");
        Ok(path)
    }

    /// Reads a manifest back from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifestError::Io`] if the file cannot be read and
    /// [`ManifestError::Parse`] if it is not valid manifest JSON.
    pub async fn load(path: &Path) -> Result<Manifest, ManifestError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ManifestError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        serde_json::from_slice(&bytes).map_err(|source| ManifestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn target() -> RepositoryTarget {
        RepositoryTarget::parse("https://github.com/o/r").unwrap()
    }

    #[test]
    fn test_manifest_omits_empty_lists() {
        let mut assets = ClassifiedAssets::new();
        assets.classify("https://github.com/o/r/archive/refs/tags/v1.zip");
        let json = serde_json::to_value(Manifest::new(&target(), assets)).unwrap();

        assert_eq!(json["repo_name"], "r");
        assert_eq!(json["repo_url"], "https://github.com/o/r");
        assert!(json["download_sources"].get("tar_list").is_none());
        assert_eq!(json["download_sources"]["zip_list"][0], "https://github.com/o/r/archive/refs/tags/v1.zip");
    }

    #[test]
    fn test_manifest_key_order() {
        let mut assets = ClassifiedAssets::new();
        assets.classify("https://h/o/r/archive/refs/tags/a.zip");
        assets.classify("https://h/o/r/archive/refs/tags/a.tar.gz");
        let text = serde_json::to_string(&Manifest::new(&target(), assets)).unwrap();

        let name = text.find("\"repo_name\"").unwrap();
        let url = text.find("\"repo_url\"").unwrap();
        let tar = text.find("\"tar_list\"").unwrap();
        let zip = text.find("\"zip_list\"").unwrap();
        assert!(name < url && url < tar && tar < zip, "unexpected order: {text}");
    }

    #[tokio::test]
    async fn test_persist_round_trip_keeps_discovery_order() {
        let dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(dir.path());
        let mut assets = ClassifiedAssets::new();
        for tag in ["v3", "v1", "v2"] {
            assets.classify(&format!("https://h/o/r/archive/refs/tags/{tag}.zip"));
            assets.classify(&format!("https://h/o/r/archive/refs/tags/{tag}.tar.gz"));
        }
        assets.classify("https://h/o/r/archive/refs/tags/v9.zip");
        let manifest = Manifest::new(&target(), assets.clone());

        let path = writer.persist(&manifest).await.unwrap();
        assert_eq!(path, dir.path().join("output-r.json"));

        let loaded = ManifestWriter::load(&path).await.unwrap();
        assert_eq!(loaded, manifest);
        assert_eq!(loaded.download_sources.zip().len(), 4);
        assert_eq!(loaded.download_sources.tar_gz().len(), 3);
        assert_eq!(loaded.download_sources.zip(), assets.zip());
    }

    #[tokio::test]
    async fn test_persist_overwrites_previous_content() {
        let dir = TempDir::new().unwrap();
        let writer = ManifestWriter::new(dir.path().join("nested"));
        let mut assets = ClassifiedAssets::new();
        assets.classify("https://h/o/r/archive/refs/tags/v1.zip");
        assets.classify("https://h/o/r/archive/refs/tags/v2.zip");
        writer.persist(&Manifest::new(&target(), assets)).await.unwrap();

        let path = writer
            .persist(&Manifest::new(&target(), ClassifiedAssets::new()))
            .await
            .unwrap();

        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "{\"repo_name\":\"r\",\"repo_url\":\"https://github.com/o/r\",\"download_sources\":{}}\n");
    }

    #[tokio::test]
    async fn test_load_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output-x.json");
        std::fs::write(&path, "not json").unwrap();

        let error = ManifestWriter::load(&path).await.unwrap_err();
        assert!(matches!(error, ManifestError::Parse { .. }));
    }
}
