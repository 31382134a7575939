//! File download operations with atomic writes and streaming
//!
//! Archives are streamed chunk by chunk into `<name>.tmp` and renamed into
//! place only once the whole body has arrived, so an interrupted run never
//! leaves a file that a later idempotence check would take for complete.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::app::client::http::HttpHandler;
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// File download operations handler
pub struct DownloadHandler<'a> {
    http_handler: &'a HttpHandler,
}

impl<'a> DownloadHandler<'a> {
    /// Creates a new DownloadHandler with the given HTTP handler
    pub fn new(http_handler: &'a HttpHandler) -> Self {
        Self { http_handler }
    }

    /// Downloads a file to the specified path with atomic operations
    ///
    /// An existing file at `destination` is replaced only once the new body
    /// has fully arrived.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if:
    /// - The server answers with a non-success status
    /// - The body is shorter than the announced Content-Length
    /// - File I/O operations fail
    pub async fn download_file(&self, url: &Url, destination: &Path) -> DownloadResult<u64> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = temp_path_for(destination);

        match self.download_to_temp(url, &temp_path).await {
            Ok(bytes) => {
                tokio::fs::rename(&temp_path, destination)
                    .await
                    .map_err(|_e| DownloadError::AtomicOperationFailed {
                        temp_path: temp_path.clone(),
                        final_path: destination.to_path_buf(),
                    })?;
                tracing::info!(
                    "Downloaded {} ({} bytes)",
                    destination.display(),
                    bytes
                );
                Ok(bytes)
            }
            Err(e) => {
                if temp_path.exists() {
                    let _ = tokio::fs::remove_file(&temp_path).await;
                }
                Err(e)
            }
        }
    }

    /// Streams the response body into a temporary path
    async fn download_to_temp(&self, url: &Url, temp_path: &Path) -> DownloadResult<u64> {
        let mut response = self.http_handler.get_response(url).await?;

        if !response.status().is_success() {
            return Err(match response.status().as_u16() {
                404 => DownloadError::NotFound {
                    url: url.to_string(),
                },
                403 => DownloadError::Forbidden {
                    url: url.to_string(),
                },
                status => DownloadError::ServerError { status },
            });
        }

        let expected = response.content_length();
        let mut file = File::create(temp_path).await?;
        let mut received: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
        }
        file.flush().await?;

        if let Some(expected) = expected {
            if received < expected {
                return Err(DownloadError::IncompleteDownload { received, expected });
            }
        }

        Ok(received)
    }
}

/// Temporary sibling path used while a download is in flight
pub fn temp_path_for(destination: &Path) -> PathBuf {
    destination.with_extension(format!(
        "{}{}",
        destination
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or(""),
        files::TEMP_FILE_SUFFIX
    ))
}
