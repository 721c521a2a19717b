//! Media fetch port - Download attachments by URL

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;

use crate::{error::ApplicationError, ports::DownloadedMedia};

/// Downloads helpdesk attachments (or any other URL-backed media)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaFetchPort: Send + Sync {
    /// Fetch the full body of `url`
    ///
    /// The MIME type comes from the response, falling back to
    /// `application/octet-stream`.
    async fn fetch(&self, url: &str) -> Result<DownloadedMedia, ApplicationError>;
}
