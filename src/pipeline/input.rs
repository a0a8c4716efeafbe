//! Document acquisition: validate the caller's URL and download the bytes.
//!
//! Validation is a separate, synchronous step so a malformed URL is rejected
//! before any connection is opened. The download itself is a single attempt
//! behind the [`DocumentFetcher`] trait; [`HttpFetcher`] is the production
//! implementation.

use crate::config::AnalyzerConfig;
use crate::error::AnalyzeError;
use async_trait::async_trait;
use reqwest::Url;
use std::time::Duration;
use tracing::{debug, info};

/// Raw document bytes plus where they came from.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: Url,
    pub bytes: Vec<u8>,
}

/// Parse and check a caller-supplied URL.
///
/// Only absolute `http`/`https` URLs are accepted.
pub fn validate_url(input: &str) -> Result<Url, AnalyzeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AnalyzeError::MissingUrl);
    }

    let url = Url::parse(trimmed).map_err(|e| AnalyzeError::InvalidUrl {
        input: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AnalyzeError::UnsupportedScheme {
            url: trimmed.to_string(),
            scheme: other.to_string(),
        }),
    }
}

/// Retrieves document bytes for a validated URL.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<SourceDocument, AnalyzeError>;
}

/// Downloads documents over HTTP(S) with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout_secs: u64,
    max_bytes: u64,
}

impl HttpFetcher {
    pub fn new(timeout_secs: u64, max_bytes: u64) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnalyzeError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            timeout_secs,
            max_bytes,
        })
    }

    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, AnalyzeError> {
        Self::new(config.download_timeout_secs, config.max_download_bytes)
    }

    fn network_error(&self, url: &Url, e: reqwest::Error) -> AnalyzeError {
        if e.is_timeout() {
            AnalyzeError::DownloadTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            AnalyzeError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<SourceDocument, AnalyzeError> {
        info!("Downloading document from: {}", url);

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.network_error(url, e))?;

        if !response.status().is_success() {
            return Err(AnalyzeError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let too_large = || AnalyzeError::DocumentTooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        };

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.network_error(url, e))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!("Downloaded {} bytes", bytes.len());
        Ok(SourceDocument {
            url: url.clone(),
            bytes,
        })
    }
}
