//! Core HTTP operations with rate limiting and retry logic
//!
//! This module provides the fundamental HTTP request operations with
//! built-in resilience patterns: rate limiting with jitter and exponential
//! backoff on transport errors, 429 and 503 responses.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use super::config::ClientConfig;
use crate::constants::limits;
use crate::errors::{DownloadError, DownloadResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler from a built client and its configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::InvalidConfiguration` if the rate limit is zero
    pub fn new(client: Client, config: &ClientConfig) -> DownloadResult<Self> {
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> DownloadResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            DownloadError::InvalidConfiguration {
                reason: "Rate limit must be non-zero".to_string(),
            }
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Fetches a URL with GET, applying rate limiting and retries
    ///
    /// The response is returned whatever its status apart from 429/503,
    /// which are retried; callers decide how to treat other statuses.
    pub async fn get_response(&self, url: &Url) -> DownloadResult<Response> {
        self.send_with_retries(url, || self.client.get(url.as_str()))
            .await
    }

    /// Posts a pre-encoded `application/x-www-form-urlencoded` body
    pub async fn post_form(&self, url: &Url, body: &str, referer: &Url) -> DownloadResult<Response> {
        self.send_with_retries(url, || {
            self.client
                .post(url.as_str())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .header("Referer", referer.as_str())
                .body(body.to_string())
        })
        .await
    }

    /// Fetches the text of a page, failing on non-success statuses
    pub async fn get_page(&self, url: &Url) -> DownloadResult<String> {
        let response = self.get_response(url).await?;
        if !response.status().is_success() {
            return Err(DownloadError::ServerError {
                status: response.status().as_u16(),
            });
        }
        let text = response.text().await?;
        tracing::debug!("Successfully fetched page: {}", url);
        Ok(text)
    }

    async fn send_with_retries<F>(&self, url: &Url, build: F) -> DownloadResult<Response>
    where
        F: Fn() -> RequestBuilder,
    {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(
                limits::RATE_LIMIT_JITTER_MS,
            )))
            .await;

        let mut retries = 0;
        loop {
            match build().send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if status == 429 || status == 503 {
                        if retries < self.max_retries {
                            retries += 1;
                            let delay = self.backoff_delay(retries);
                            tracing::warn!(
                                "Server answered {} for {}. Backing off for {}ms",
                                status,
                                url,
                                delay.as_millis()
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        return Err(if status == 429 {
                            DownloadError::RateLimitExceeded
                        } else {
                            DownloadError::ServerOverloaded
                        });
                    }

                    tracing::debug!("Fetched response {} from {}", status, url);
                    return Ok(response);
                }
                Err(e) if retries < self.max_retries => {
                    retries += 1;
                    let delay = self.backoff_delay(retries);
                    tracing::warn!(
                        "Request to {} failed (attempt {}/{}): {}. Retrying in {}ms",
                        url,
                        retries,
                        self.max_retries,
                        e,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::error!("Request to {} failed after {} retries: {}", url, retries, e);
                    return Err(DownloadError::Http(e));
                }
            }
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay * 2_u32.saturating_pow(attempt)
    }
}
