//! HTTP media fetcher
//!
//! Implements the `MediaFetchPort` trait with a plain reqwest client. Used
//! for helpdesk attachment URLs.

use std::time::Duration;

use application::{
    error::ApplicationError,
    ports::{DownloadedMedia, MediaFetchPort},
};
use async_trait::async_trait;
use reqwest::{Client, header::CONTENT_TYPE};
use tracing::{debug, instrument};

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Downloads media over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    max_bytes: Option<u64>,
}

impl HttpMediaFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ApplicationError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApplicationError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_bytes: None,
        })
    }

    /// Refuse bodies larger than `max_bytes`
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    fn check_size(&self, size: u64, url: &str) -> Result<(), ApplicationError> {
        match self.max_bytes {
            Some(max) if size > max => Err(ApplicationError::Validation(format!(
                "media at {url} is {size} bytes, limit is {max}"
            ))),
            _ => Ok(()),
        }
    }
}

fn map_error(err: &reqwest::Error, url: &str) -> ApplicationError {
    if err.is_timeout() {
        ApplicationError::Timeout(format!("fetch {url}"))
    } else {
        ApplicationError::TransientRemote(format!("fetch {url}: {err}"))
    }
}

#[async_trait]
impl MediaFetchPort for HttpMediaFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<DownloadedMedia, ApplicationError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| map_error(&e, url))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ApplicationError::not_found("Media", url));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ApplicationError::TransientRemote(format!(
                "fetch {url}: HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(ApplicationError::Validation(format!(
                "fetch {url}: HTTP {status}"
            )));
        }

        if let Some(length) = response.content_length() {
            self.check_size(length, url)?;
        }

        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        // Content-Length may be absent or wrong; the running total is what counts
        let mut data = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| map_error(&e, url))? {
            self.check_size((data.len() + chunk.len()) as u64, url)?;
            data.extend_from_slice(&chunk);
        }

        debug!(size = data.len(), mime_type = %mime_type, "Fetched media");
        Ok(DownloadedMedia::new(data, mime_type))
    }
}
