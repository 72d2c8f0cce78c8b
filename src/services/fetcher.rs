// src/services/fetcher.rs

//! Listing page fetchers.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::FetchConfig;
use crate::utils::retry::{RetryPolicy, retry_with_backoff};

/// Source of raw listing markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Return the raw bytes behind `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches pages over HTTP.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the configured user agent and timeout.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(url, Some(status.as_u16()), status));
        }

        let bytes = response.bytes().await.map_err(|e| request_error(url, e))?;
        log::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

fn request_error(url: &str, error: reqwest::Error) -> AppError {
    if error.is_timeout() {
        AppError::Timeout(format!("GET {url}"))
    } else {
        AppError::fetch(url, error.status().map(|s| s.as_u16()), error)
    }
}

/// Reads a saved listing from disk instead of the network; the URL is ignored.
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PageFetcher for FileFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(&self.path).await?)
    }
}

/// Wraps a fetcher with exponential backoff on transient failures.
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: PageFetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Retry policy taken from the `[fetch]` section.
    pub fn from_config(inner: F, config: &FetchConfig) -> Self {
        Self::new(
            inner,
            RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.backoff_base_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
        )
    }
}

#[async_trait]
impl<F: PageFetcher> PageFetcher for RetryingFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        retry_with_backoff(&self.policy, &format!("GET {url}"), || self.inner.fetch(url)).await
    }
}
