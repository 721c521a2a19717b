//! WhatsApp client for the message gateway
//!
//! Speaks the Cloud-API style Graph endpoints: text and media sends, media
//! upload and media download. The base URL is configurable so self-hosted
//! gateways and test servers can stand in for `graph.facebook.com`.

use std::time::Duration;

use reqwest::{
    Client, Response, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

const GROUP_SUFFIX: &str = "@g.us";

/// WhatsApp API errors
#[derive(Debug, Error)]
pub enum WhatsAppError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {code} - {message}")]
    Api {
        status: u16,
        code: i32,
        message: String,
    },

    #[error("Missing configuration: {0}")]
    Configuration(String),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl WhatsAppError {
    /// HTTP status of a rejected call, if the gateway answered at all
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the request hit the client timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Request(e) if e.is_timeout())
    }

    /// Network failures, throttling and server errors
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// WhatsApp client configuration
#[derive(Debug, Clone)]
pub struct WhatsAppClientConfig {
    /// Gateway base URL without the version segment
    pub base_url: String,
    /// Graph API version (default: v18.0)
    pub api_version: String,
    /// Phone number ID of the sending business number
    pub phone_number_id: String,
    /// Bearer token
    pub access_token: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for WhatsAppClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com".to_string(),
            api_version: "v18.0".to_string(),
            phone_number_id: String::new(),
            access_token: String::new(),
            timeout: Duration::from_secs(15),
        }
    }
}

/// Outgoing media categories accepted by the messages endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingMediaType {
    Image,
    Audio,
    Video,
    Document,
}

impl OutgoingMediaType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

/// A media send, referring to previously uploaded media
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMedia {
    pub media_type: OutgoingMediaType,
    pub media_id: String,
    pub caption: Option<String>,
    pub file_name: Option<String>,
}

/// Raw media bytes fetched from the gateway
#[derive(Clone, PartialEq, Eq)]
pub struct MediaContent {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl std::fmt::Debug for MediaContent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaContent")
            .field("bytes", &format_args!("{} bytes", self.bytes.len()))
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

/// WhatsApp client for the Graph-style gateway API
#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    client: Client,
    config: WhatsAppClientConfig,
    base_url: String,
}

/// Message send request
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    messaging_product: &'static str,
    recipient_type: &'static str,
    to: &'a str,
    #[serde(flatten)]
    content: MessageContent<'a>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum MessageContent<'a> {
    Text { text: TextContent<'a> },
    Image { image: MediaObject<'a> },
    Audio { audio: MediaObject<'a> },
    Video { video: MediaObject<'a> },
    Document { document: MediaObject<'a> },
}

#[derive(Debug, Serialize)]
struct TextContent<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct MediaObject<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    caption: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    filename: Option<&'a str>,
}

/// API response for sent message
#[derive(Debug, Deserialize)]
pub struct SendMessageResponse {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub contacts: Vec<ContactInfo>,
    #[serde(default)]
    pub messages: Vec<MessageInfo>,
}

impl SendMessageResponse {
    /// Id of the accepted message
    pub fn message_id(&self) -> Option<&str> {
        self.messages.first().map(|m| m.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct ContactInfo {
    pub input: String,
    pub wa_id: String,
}

#[derive(Debug, Deserialize)]
pub struct MessageInfo {
    pub id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    id: String,
}

/// Metadata of uploaded or received media
#[derive(Debug, Deserialize)]
pub struct MediaUrlResponse {
    pub url: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// API error response
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: i32,
    message: String,
}

impl WhatsAppClient {
    /// Create a new WhatsApp client
    pub fn new(config: WhatsAppClientConfig) -> Result<Self, WhatsAppError> {
        if config.access_token.is_empty() {
            return Err(WhatsAppError::Configuration(
                "access_token is required".to_string(),
            ));
        }
        if config.phone_number_id.is_empty() {
            return Err(WhatsAppError::Configuration(
                "phone_number_id is required".to_string(),
            ));
        }
        if config.base_url.is_empty() {
            return Err(WhatsAppError::Configuration(
                "base_url is required".to_string(),
            ));
        }

        let base_url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            config.api_version
        );

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    fn phone_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{endpoint}",
            self.base_url, self.config.phone_number_id
        )
    }

    /// Send a text message
    #[instrument(skip(self, message), fields(to = %to))]
    pub async fn send_text(
        &self,
        to: &str,
        message: &str,
    ) -> Result<SendMessageResponse, WhatsAppError> {
        debug!(message_len = message.len(), "Sending WhatsApp text message");
        self.send(to, MessageContent::Text {
            text: TextContent { body: message },
        })
        .await
    }

    /// Send previously uploaded media
    #[instrument(skip(self, media), fields(to = %to, media_type = media.media_type.as_str()))]
    pub async fn send_media(
        &self,
        to: &str,
        media: &OutgoingMedia,
    ) -> Result<SendMessageResponse, WhatsAppError> {
        let caption = media.caption.as_deref().filter(|c| !c.is_empty());
        let object = |with_caption: bool, with_name: bool| MediaObject {
            id: &media.media_id,
            caption: caption.filter(|_| with_caption),
            filename: media.file_name.as_deref().filter(|_| with_name),
        };

        // Audio carries neither caption nor file name; only documents keep the name
        let content = match media.media_type {
            OutgoingMediaType::Image => MessageContent::Image {
                image: object(true, false),
            },
            OutgoingMediaType::Audio => MessageContent::Audio {
                audio: object(false, false),
            },
            OutgoingMediaType::Video => MessageContent::Video {
                video: object(true, false),
            },
            OutgoingMediaType::Document => MessageContent::Document {
                document: object(true, true),
            },
        };

        self.send(to, content).await
    }

    async fn send(
        &self,
        to: &str,
        content: MessageContent<'_>,
    ) -> Result<SendMessageResponse, WhatsAppError> {
        let (recipient, recipient_type) = normalize_recipient(to)?;

        let request = SendMessageRequest {
            messaging_product: "whatsapp",
            recipient_type,
            to: &recipient,
            content,
        };

        let response = self
            .client
            .post(self.phone_url("messages"))
            .bearer_auth(&self.config.access_token)
            .json(&request)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Upload media bytes, returning the media id to send with
    #[instrument(skip(self, data), fields(size = data.len(), mime_type = %mime_type))]
    pub async fn upload_media(
        &self,
        data: Vec<u8>,
        mime_type: &str,
        file_name: &str,
    ) -> Result<String, WhatsAppError> {
        let file_part = Part::bytes(data)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(|e| WhatsAppError::Configuration(format!("Invalid MIME type: {e}")))?;

        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", file_part);

        let response = self
            .client
            .post(self.phone_url("media"))
            .bearer_auth(&self.config.access_token)
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        let upload: MediaUploadResponse = response.json().await?;
        debug!(media_id = %upload.id, "Uploaded media");
        Ok(upload.id)
    }

    /// Resolve a media id to its download URL
    #[instrument(skip(self))]
    pub async fn media_url(&self, media_id: &str) -> Result<MediaUrlResponse, WhatsAppError> {
        let response = self
            .client
            .get(format!("{}/{media_id}", self.base_url))
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Download media by id
    ///
    /// Two calls: the media id resolves to a short-lived URL, which is then
    /// fetched with the same bearer token.
    #[instrument(skip(self))]
    pub async fn download_media(&self, media_id: &str) -> Result<MediaContent, WhatsAppError> {
        let info = self.media_url(media_id).await?;

        let response = self
            .client
            .get(&info.url)
            .bearer_auth(&self.config.access_token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let header_mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        if let Some(expected) = info.file_size {
            if expected != bytes.len() as u64 {
                warn!(
                    expected,
                    actual = bytes.len(),
                    "Downloaded media size differs from reported size"
                );
            }
        }

        let mime_type = info
            .mime_type
            .or(header_mime)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        debug!(size = bytes.len(), mime_type = %mime_type, "Downloaded media");
        Ok(MediaContent { bytes, mime_type })
    }

    /// Check if the gateway is reachable with the configured credentials
    #[instrument(skip(self))]
    pub async fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/{}", self.base_url, self.config.phone_number_id))
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .is_ok_and(|res| res.status().is_success())
    }
}

/// Split a recipient into the wire form and its recipient type
///
/// Individuals are sent as bare digits; groups keep their `@g.us` id.
fn normalize_recipient(to: &str) -> Result<(String, &'static str), WhatsAppError> {
    let to = to.trim();

    if let Some(group) = to.strip_suffix(GROUP_SUFFIX) {
        if group.is_empty() {
            return Err(WhatsAppError::InvalidRecipient(to.to_string()));
        }
        return Ok((to.to_string(), "group"));
    }

    let user = to.split('@').next().unwrap_or(to);
    let digits: String = user.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 7 {
        return Err(WhatsAppError::InvalidRecipient(to.to_string()));
    }
    Ok((digits, "individual"))
}

async fn check_status(response: Response) -> Result<Response, WhatsAppError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> WhatsAppError {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(parsed) => WhatsAppError::Api {
            status: status.as_u16(),
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => WhatsAppError::Api {
            status: status.as_u16(),
            code: 0,
            message: if body.is_empty() {
                status.to_string()
            } else {
                body.chars().take(200).collect()
            },
        },
    }
}
