//! Repository list file reading.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors reading a repository list.
#[derive(Debug, Error)]
pub enum InputError {
    /// The list file does not exist.
    #[error("repository list not found: {path}")]
    NotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The list file could not be read.
    #[error("cannot read repository list {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Reads a newline-delimited list of repository URLs.
///
/// Surrounding whitespace is trimmed and blank lines are skipped. Entries
/// are not validated here.
///
/// # Errors
///
/// Returns [`InputError::NotFound`] if the file is missing and
/// [`InputError::Io`] for any other read failure.
pub fn read_repository_list(path: &Path) -> Result<Vec<String>, InputError> {
    let content = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            InputError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            InputError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect())
}
