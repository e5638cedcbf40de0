//! One archive transfer: request, stream to disk, report progress.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;
use url::Url;

use super::cancel::CancelSignal;
use super::error::DownloadError;
use super::progress::AssetProgress;

/// Downloads `url` into `path`, stopping at the next chunk boundary once
/// `cancel` fires.
///
/// Returns the announced content length (`0` when the response did not
/// carry one). A partially written file is left in place on failure and
/// holds every byte received before it.
pub(crate) async fn download_asset(
    client: &Client,
    url: &Url,
    path: &Path,
    progress: &AssetProgress,
    cancel: &CancelSignal,
) -> Result<u64, DownloadError> {
    if cancel.is_cancelled() {
        return Err(DownloadError::cancelled(url.as_str()));
    }

    debug!(url = %url, path = %path.display(), "download started");
    progress.start();

    // Truncates any earlier copy.
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    let response = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(DownloadError::cancelled(url.as_str())),
        sent = client.get(url.clone()).send() => {
            sent.map_err(|e| DownloadError::network(url.as_str(), e))?
        }
    };

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
    }

    let content_length = response.content_length();
    if let Some(total) = content_length {
        progress.set_total(total);
    }

    let written = stream_to_file(file, response, url.as_str(), path, progress, cancel).await?;
    debug!(url = %url, bytes = written, "body written");

    Ok(content_length.unwrap_or(0))
}

async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    progress: &AssetProgress,
    cancel: &CancelSignal,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let copied = copy_body(&mut writer, response, url, path, progress, cancel).await;

    // Buffered bytes reach the file whether or not the copy finished.
    let flushed = writer.flush().await.map_err(|e| DownloadError::io(path, e));
    let bytes_written = copied?;
    flushed?;

    Ok(bytes_written)
}

async fn copy_body(
    writer: &mut BufWriter<File>,
    response: reqwest::Response,
    url: &str,
    path: &Path,
    progress: &AssetProgress,
    cancel: &CancelSignal,
) -> Result<u64, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(DownloadError::cancelled(url)),
            next = stream.next() => next,
        };
        let Some(chunk) = next else {
            break;
        };

        let chunk = chunk.map_err(|e| DownloadError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;

        let len = chunk.len() as u64;
        bytes_written += len;
        progress.inc(len);
    }

    Ok(bytes_written)
}
