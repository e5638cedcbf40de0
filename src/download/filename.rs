//! Destination filename derivation for archive URLs.

use url::Url;

/// Used when a URL has no usable final path segment.
pub(crate) const FALLBACK_FILENAME: &str = "download.bin";

/// Final path segment of `url`, percent-decoded and made safe to join onto
/// a directory.
pub(crate) fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::decode(segment).map_or_else(|_| segment.to_string(), |d| d.into_owned()))
        .map(|name| sanitize_filename(&name))
        .filter(|name| !name.is_empty() && name != "." && name != "..")
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

/// Replaces path separators and control characters.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_string()
}
