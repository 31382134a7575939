//! HTTP client implementation for the INEI microdata portal
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with resilience patterns
//! - `download`: File download operations with atomic writes

use std::path::Path;

use async_trait::async_trait;
use url::Url;

use crate::app::archive::ArchiveFetcher;
use crate::constants::inei;
use crate::errors::{DownloadError, DownloadResult};

pub mod config;
pub mod download;
pub mod http;

pub use config::ClientConfig;

use download::DownloadHandler;
use http::HttpHandler;

/// HTTP client for the INEI microdata portal
///
/// Shared by the catalog provider (listing pages) and the archive
/// retriever (module archives); one rate limiter covers both.
#[derive(Debug)]
pub struct IneiClient {
    http_handler: HttpHandler,
    base_url: Url,
}

impl IneiClient {
    /// Creates a client pointed at the public portal
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if HTTP client creation fails
    pub fn new(config: ClientConfig) -> DownloadResult<Self> {
        let base_url = Url::parse(inei::BASE_URL).map_err(|e| DownloadError::InvalidUrl {
            url: inei::BASE_URL.to_string(),
            error: e.to_string(),
        })?;
        Self::with_base_url(config, base_url)
    }

    /// Creates a client against another base URL (mirrors, test servers)
    pub fn with_base_url(config: ClientConfig, base_url: Url) -> DownloadResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, &config)?;

        tracing::debug!("Created INEI client for {}", base_url);

        Ok(Self {
            http_handler,
            base_url,
        })
    }

    /// Resolves a path relative to the portal base URL
    pub fn resolve(&self, path: &str) -> DownloadResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DownloadError::InvalidUrl {
                url: path.to_string(),
                error: e.to_string(),
            })
    }

    /// Fetches the HTML content of a web page
    pub async fn get_page(&self, url: &Url) -> DownloadResult<String> {
        self.http_handler.get_page(url).await
    }

    /// Submits a form and returns the response body as text
    pub async fn post_form_page(&self, url: &Url, body: &str, referer: &Url) -> DownloadResult<String> {
        let response = self.http_handler.post_form(url, body, referer).await?;
        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Downloads a file to the specified path with atomic operations
    pub async fn download_file(&self, url: &Url, destination: &Path) -> DownloadResult<u64> {
        DownloadHandler::new(&self.http_handler)
            .download_file(url, destination)
            .await
    }

    /// Get the portal base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

#[async_trait]
impl ArchiveFetcher for IneiClient {
    async fn fetch(&self, url: &Url, destination: &Path) -> DownloadResult<u64> {
        // the retriever has already decided the archive must be (re)fetched
        self.download_file(url, destination).await
    }
}
