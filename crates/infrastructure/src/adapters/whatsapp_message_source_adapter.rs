//! WhatsApp message source adapter
//!
//! Implements the `MessageSourcePort` trait using the WhatsApp integration
//! crate. Media sends upload the bytes first and then send by media id.

use std::fmt;

use application::{
    error::ApplicationError,
    ports::{DownloadedMedia, MediaPayload, MessageSourcePort},
};
use async_trait::async_trait;
use domain::WhatsAppIdentity;
use integration_whatsapp::{
    OutgoingMedia, OutgoingMediaType, SendMessageResponse, WhatsAppClient, WhatsAppClientConfig,
    WhatsAppError,
};
use tracing::{debug, instrument};

/// Adapter that implements `MessageSourcePort` using `WhatsAppClient`
pub struct WhatsAppMessageSourceAdapter {
    client: WhatsAppClient,
}

impl WhatsAppMessageSourceAdapter {
    pub fn new(config: WhatsAppClientConfig) -> Result<Self, WhatsAppError> {
        Ok(Self {
            client: WhatsAppClient::new(config)?,
        })
    }

    pub const fn from_client(client: WhatsAppClient) -> Self {
        Self { client }
    }

    pub const fn client(&self) -> &WhatsAppClient {
        &self.client
    }

    async fn upload_and_send(
        &self,
        recipient: &WhatsAppIdentity,
        media_type: OutgoingMediaType,
        media: MediaPayload,
    ) -> Result<String, ApplicationError> {
        let file_name = if media.file_name.is_empty() {
            format!("{}.{}", media_type.as_str(), mime_to_extension(&media.mime_type))
        } else {
            media.file_name
        };

        let media_id = self
            .client
            .upload_media(media.data, &media.mime_type, &file_name)
            .await
            .map_err(|e| map_error(e, "upload media"))?;

        debug!(media_id = %media_id, "Media uploaded to WhatsApp");

        let outgoing = OutgoingMedia {
            media_type,
            media_id,
            caption: media.caption,
            file_name: Some(file_name),
        };

        let response = self
            .client
            .send_media(&recipient.recipient(), &outgoing)
            .await
            .map_err(|e| map_error(e, "send media"))?;

        message_id(&response)
    }
}

impl fmt::Debug for WhatsAppMessageSourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WhatsAppMessageSourceAdapter")
            .finish_non_exhaustive()
    }
}

fn map_error(err: WhatsAppError, operation: &str) -> ApplicationError {
    if err.is_timeout() {
        return ApplicationError::Timeout(format!("WhatsApp {operation}: {err}"));
    }
    if err.is_transient() {
        return ApplicationError::TransientRemote(format!("WhatsApp {operation}: {err}"));
    }

    match err {
        WhatsAppError::Api { status: 404, .. } => ApplicationError::not_found("WhatsApp media", operation),
        WhatsAppError::Api { status, .. } if (400..500).contains(&status) => {
            ApplicationError::Validation(format!("WhatsApp {operation}: {err}"))
        },
        WhatsAppError::InvalidRecipient(recipient) => {
            ApplicationError::Validation(format!("invalid WhatsApp recipient: {recipient}"))
        },
        WhatsAppError::Configuration(msg) => ApplicationError::Configuration(msg),
        other => ApplicationError::ExternalService(format!("WhatsApp {operation}: {other}")),
    }
}

fn message_id(response: &SendMessageResponse) -> Result<String, ApplicationError> {
    response.message_id().map(str::to_string).ok_or_else(|| {
        ApplicationError::ExternalService("No message ID in WhatsApp response".to_string())
    })
}

/// File extension for a MIME type, used when a payload has no file name
pub(crate) fn mime_to_extension(mime_type: &str) -> &'static str {
    match mime_type.split(';').next().unwrap_or(mime_type).trim() {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/mp4" | "audio/m4a" => "m4a",
        "audio/aac" => "aac",
        "video/mp4" => "mp4",
        "video/3gpp" => "3gp",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

#[async_trait]
impl MessageSourcePort for WhatsAppMessageSourceAdapter {
    #[instrument(skip(self, text), fields(recipient = %recipient, text_len = text.len()))]
    async fn send_text(
        &self,
        recipient: &WhatsAppIdentity,
        text: &str,
    ) -> Result<String, ApplicationError> {
        let response = self
            .client
            .send_text(&recipient.recipient(), text)
            .await
            .map_err(|e| map_error(e, "send text"))?;

        let id = message_id(&response)?;
        debug!(message_id = %id, "WhatsApp text message sent");
        Ok(id)
    }

    #[instrument(skip(self, media), fields(recipient = %recipient, size = media.data.len()))]
    async fn send_image(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError> {
        self.upload_and_send(recipient, OutgoingMediaType::Image, media)
            .await
    }

    #[instrument(skip(self, media), fields(recipient = %recipient, size = media.data.len()))]
    async fn send_audio(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError> {
        self.upload_and_send(recipient, OutgoingMediaType::Audio, media)
            .await
    }

    #[instrument(skip(self, media), fields(recipient = %recipient, size = media.data.len()))]
    async fn send_video(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError> {
        self.upload_and_send(recipient, OutgoingMediaType::Video, media)
            .await
    }

    #[instrument(skip(self, media), fields(recipient = %recipient, size = media.data.len()))]
    async fn send_document(
        &self,
        recipient: &WhatsAppIdentity,
        media: MediaPayload,
    ) -> Result<String, ApplicationError> {
        self.upload_and_send(recipient, OutgoingMediaType::Document, media)
            .await
    }

    #[instrument(skip(self))]
    async fn download_media(&self, media_id: &str) -> Result<DownloadedMedia, ApplicationError> {
        let content = self
            .client
            .download_media(media_id)
            .await
            .map_err(|e| map_error(e, "download media"))?;

        debug!(size = content.bytes.len(), mime_type = %content.mime_type, "WhatsApp media downloaded");
        Ok(DownloadedMedia::new(content.bytes, content.mime_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> WhatsAppError {
        WhatsAppError::Api {
            status,
            code: 100,
            message: "error".to_string(),
        }
    }

    #[test]
    fn server_errors_are_transient() {
        assert!(matches!(
            map_error(api(500), "send text"),
            ApplicationError::TransientRemote(_)
        ));
        assert!(matches!(
            map_error(api(429), "send text"),
            ApplicationError::TransientRemote(_)
        ));
    }

    #[test]
    fn missing_media_is_not_found() {
        assert!(map_error(api(404), "download media").is_not_found());
    }

    #[test]
    fn client_errors_are_validation() {
        assert!(matches!(
            map_error(api(400), "send text"),
            ApplicationError::Validation(_)
        ));
        assert!(matches!(
            map_error(WhatsAppError::InvalidRecipient("+1".into()), "send text"),
            ApplicationError::Validation(_)
        ));
    }

    #[test]
    fn mime_extension_mapping() {
        assert_eq!(mime_to_extension("audio/ogg; codecs=opus"), "ogg");
        assert_eq!(mime_to_extension("image/jpeg"), "jpg");
        assert_eq!(mime_to_extension("application/x-unknown"), "bin");
    }

    #[test]
    fn missing_message_id_is_an_error() {
        let response: SendMessageResponse =
            serde_json::from_value(serde_json::json!({ "messaging_product": "whatsapp" })).unwrap();
        assert!(message_id(&response).is_err());
    }
}
