//! Message source port - The WhatsApp side of the bridge
//!
//! Sends text and media to WhatsApp recipients and downloads media that
//! arrived through the gateway.

#[cfg(test)]
use mockall::automock;

use std::fmt;

use async_trait::async_trait;
use domain::{MediaKind, WhatsAppIdentity};

use crate::error::ApplicationError;

/// Raw media bytes as fetched from a remote system
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedMedia {
    pub data: Vec<u8>,
    pub mime_type: String,
}

impl DownloadedMedia {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl fmt::Debug for DownloadedMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadedMedia")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// A fully downloaded attachment ready for upload
#[derive(Clone, PartialEq, Eq)]
pub struct MediaPayload {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
    pub caption: Option<String>,
}

impl MediaPayload {
    pub fn new(media: DownloadedMedia, file_name: impl Into<String>) -> Self {
        Self {
            data: media.data,
            mime_type: media.mime_type,
            file_name: file_name.into(),
            caption: None,
        }
    }

    #[must_use]
    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption;
        self
    }

    pub fn kind(&self) -> MediaKind {
        MediaKind::detect(&self.mime_type, &self.file_name)
    }
}

impl fmt::Debug for MediaPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaPayload")
            .field("bytes", &self.data.len())
            .field("mime_type", &self.mime_type)
            .field("file_name", &self.file_name)
            .field("caption", &self.caption)
            .finish()
    }
}

/// WhatsApp gateway operations needed by the bridge
///
/// Every send returns the gateway's message id.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MessageSourcePort: Send + Sync {
    async fn send_text(
        &self,
        recipient: &WhatsAppIdentity,
        text: &str,
    ) -> Result<String, ApplicationError>;

    async fn send_image(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError>;

    async fn send_audio(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError>;

    async fn send_video(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError>;

    async fn send_document(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError>;

    /// Download media that arrived through the gateway
    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ApplicationError>;
}

/// Route a payload to the send call matching its [`MediaKind`]
pub async fn send_media<P>(
    port: &P,
    recipient: &WhatsAppIdentity,
    media: MediaPayload,
) -> Result<String, ApplicationError>
where
    P: MessageSourcePort + ?Sized,
{
    match media.kind() {
        MediaKind::Image => port.send_image(recipient, media).await,
        MediaKind::Audio => port.send_audio(recipient, media).await,
        MediaKind::Video => port.send_video(recipient, media).await,
        MediaKind::Document => port.send_document(recipient, media).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(mime: &str, name: &str) -> MediaPayload {
        MediaPayload::new(DownloadedMedia::new(vec![1, 2, 3], mime), name)
    }

    #[test]
    fn debug_hides_bytes() {
        let media = DownloadedMedia::new(vec![0; 1024], "image/png");
        let debug = format!("{media:?}");
        assert!(debug.contains("bytes: 1024"));
        assert!(debug.contains("image/png"));
    }

    #[test]
    fn payload_kind_follows_mime() {
        assert_eq!(payload("audio/ogg", "v.ogg").kind(), MediaKind::Audio);
        assert_eq!(payload("application/pdf", "a.pdf").kind(), MediaKind::Document);
    }

    #[tokio::test]
    async fn send_media_routes_by_kind() {
        let mut mock = MockMessageSourcePort::new();
        mock.expect_send_video()
            .times(1)
            .returning(|_, _| Ok("wamid.video".to_string()));
        mock.expect_send_image().never();

        let recipient = WhatsAppIdentity::parse("4915123456789").unwrap();
        let id = send_media(&mock, &recipient, payload("video/mp4", "clip.mp4"))
            .await
            .unwrap();
        assert_eq!(id, "wamid.video");
    }

    #[tokio::test]
    async fn send_media_falls_back_to_document() {
        let mut mock = MockMessageSourcePort::new();
        mock.expect_send_document()
            .times(1)
            .returning(|_, _| Ok("wamid.doc".to_string()));

        let recipient = WhatsAppIdentity::parse("4915123456789").unwrap();
        let id = send_media(&mock, &recipient, payload("image/svg+xml", "logo.svg"))
            .await
            .unwrap();
        assert_eq!(id, "wamid.doc");
    }
}
