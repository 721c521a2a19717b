//! WhatsApp webhook schema
//!
//! Typed view of the gateway's inbound webhook. Every field the bridge does
//! not strictly need is optional so that unknown message subtypes decode
//! instead of failing the whole payload.

use serde::Deserialize;
use tracing::debug;

/// WhatsApp webhook payload
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntry {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChange {
    pub value: WebhookValue,
    pub field: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookValue {
    #[serde(default)]
    pub messaging_product: String,
    #[serde(default)]
    pub metadata: Option<WebhookMetadata>,
    #[serde(default)]
    pub contacts: Vec<WebhookContact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    #[serde(default)]
    pub statuses: Vec<WebhookStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMetadata {
    pub display_phone_number: String,
    pub phone_number_id: String,
}

/// Sender profile attached to a change
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookContact {
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<ContactProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub picture_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Set by gateways that echo messages sent from the business number
    #[serde(default)]
    pub from_me: bool,
    /// Group the message was posted in, when it came from a group chat
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub text: Option<TextMessage>,
    #[serde(default)]
    pub image: Option<MediaMessage>,
    #[serde(default)]
    pub audio: Option<MediaMessage>,
    #[serde(default)]
    pub video: Option<MediaMessage>,
    #[serde(default)]
    pub document: Option<MediaMessage>,
    #[serde(default)]
    pub sticker: Option<MediaMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextMessage {
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaMessage {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookStatus {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub recipient_id: Option<String>,
}

/// Media categories a message can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMediaType {
    Image,
    Audio,
    Video,
    Document,
    Sticker,
}

impl InboundMediaType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Sticker => "sticker",
        }
    }

    /// MIME type assumed when the gateway omits one
    pub const fn default_mime_type(&self) -> &'static str {
        match self {
            Self::Image => "image/jpeg",
            Self::Audio => "audio/ogg",
            Self::Video => "video/mp4",
            Self::Document => "application/octet-stream",
            Self::Sticker => "image/webp",
        }
    }
}

/// Media reference in an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMedia {
    pub media_type: InboundMediaType,
    pub media_id: String,
    pub mime_type: String,
    pub caption: Option<String>,
    pub file_name: Option<String>,
}

/// Body of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundContent {
    Text(String),
    Media(InboundMedia),
    /// A subtype the bridge does not forward (reactions, polls, buttons, ...)
    Unsupported(String),
}

/// One inbound message, flattened out of the webhook envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundWhatsAppMessage {
    pub message_id: String,
    /// Chat thread: the group JID for group messages, the sender otherwise
    pub chat_id: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub avatar_url: Option<String>,
    pub group_name: Option<String>,
    pub is_group: bool,
    pub from_me: bool,
    pub timestamp: Option<i64>,
    pub content: InboundContent,
}

impl InboundWhatsAppMessage {
    /// Caption for media, body for text
    pub fn text(&self) -> Option<&str> {
        match &self.content {
            InboundContent::Text(body) => Some(body),
            InboundContent::Media(media) => media.caption.as_deref(),
            InboundContent::Unsupported(_) => None,
        }
    }

    pub const fn media(&self) -> Option<&InboundMedia> {
        match &self.content {
            InboundContent::Media(media) => Some(media),
            _ => None,
        }
    }
}

impl WebhookMessage {
    fn content(&self) -> InboundContent {
        let media = |media_type: InboundMediaType, m: &MediaMessage| {
            InboundContent::Media(InboundMedia {
                media_type,
                media_id: m.id.clone(),
                mime_type: m
                    .mime_type
                    .clone()
                    .unwrap_or_else(|| media_type.default_mime_type().to_string()),
                caption: m.caption.clone().filter(|c| !c.trim().is_empty()),
                file_name: m.filename.clone(),
            })
        };

        match self.msg_type.as_str() {
            "text" => self.text.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |t| InboundContent::Text(t.body.clone()),
            ),
            "image" => self.image.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |m| media(InboundMediaType::Image, m),
            ),
            "audio" => self.audio.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |m| media(InboundMediaType::Audio, m),
            ),
            "video" => self.video.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |m| media(InboundMediaType::Video, m),
            ),
            "document" => self.document.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |m| media(InboundMediaType::Document, m),
            ),
            "sticker" => self.sticker.as_ref().map_or_else(
                || InboundContent::Unsupported(self.msg_type.clone()),
                |m| media(InboundMediaType::Sticker, m),
            ),
            other => InboundContent::Unsupported(other.to_string()),
        }
    }
}

/// Extract inbound messages from a webhook payload
///
/// Only `messages` changes are considered; delivery statuses are dropped.
/// Sender names come from the `contacts` block of the same change.
pub fn extract_inbound_messages(payload: &WebhookPayload) -> Vec<InboundWhatsAppMessage> {
    let mut messages = Vec::new();

    for entry in &payload.entry {
        for change in &entry.changes {
            if change.field != "messages" {
                continue;
            }

            if !change.value.statuses.is_empty() {
                debug!(count = change.value.statuses.len(), "Ignoring status updates");
            }

            for message in &change.value.messages {
                let profile = change
                    .value
                    .contacts
                    .iter()
                    .find(|c| c.wa_id == message.from)
                    .and_then(|c| c.profile.as_ref());

                let group_id = message
                    .group_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|g| !g.is_empty());

                let chat_id = group_id.map_or_else(
                    || message.from.clone(),
                    |g| {
                        if g.ends_with("@g.us") {
                            g.to_string()
                        } else {
                            format!("{g}@g.us")
                        }
                    },
                );

                messages.push(InboundWhatsAppMessage {
                    message_id: message.id.clone(),
                    chat_id,
                    sender: message.from.clone(),
                    sender_name: profile
                        .and_then(|p| p.name.clone())
                        .filter(|n| !n.trim().is_empty()),
                    avatar_url: profile.and_then(|p| p.picture_url.clone()),
                    group_name: message.group_name.clone(),
                    is_group: group_id.is_some(),
                    from_me: message.from_me,
                    timestamp: message
                        .timestamp
                        .as_deref()
                        .and_then(|t| t.parse().ok()),
                    content: message.content(),
                });
            }
        }
    }

    messages
}
