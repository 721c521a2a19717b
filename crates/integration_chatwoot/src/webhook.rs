//! Helpdesk webhook schema
//!
//! Typed view of the events Chatwoot posts to the bridge. Only
//! `message_created` events are acted upon; the rest decode and are ignored.

use serde::Deserialize;

use crate::models::{ChatwootContact, ContactInbox, MessageType};

pub const MESSAGE_CREATED: &str = "message_created";

/// One webhook delivery
#[derive(Debug, Clone, Deserialize)]
pub struct HelpdeskWebhookEvent {
    pub event: String,
    /// Message id for message events
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageType>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub sender: Option<WebhookSender>,
    #[serde(default)]
    pub conversation: Option<WebhookConversation>,
    #[serde(default)]
    pub inbox: Option<WebhookInbox>,
    #[serde(default)]
    pub attachments: Vec<WebhookAttachment>,
}

/// Author of the message (an agent, a bot or the contact)
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookSender {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub available_name: Option<String>,
    #[serde(default, rename = "type")]
    pub sender_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConversation {
    pub id: u64,
    #[serde(default)]
    pub inbox_id: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub contact_inbox: Option<ContactInbox>,
    #[serde(default)]
    pub meta: Option<WebhookConversationMeta>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConversationMeta {
    /// The contact on the other side of the conversation
    #[serde(default)]
    pub sender: Option<ChatwootContact>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookInbox {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookAttachment {
    #[serde(default)]
    pub id: Option<u64>,
    /// `image`, `audio`, `video` or `file`
    #[serde(default)]
    pub file_type: Option<String>,
    pub data_url: String,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

impl WebhookAttachment {
    /// File name taken from the last URL path segment
    pub fn file_name(&self) -> String {
        let path = self.data_url.split(['?', '#']).next().unwrap_or_default();
        let name = path.rsplit('/').next().unwrap_or_default();
        if name.is_empty() {
            let extension = self.extension.as_deref().unwrap_or("bin");
            format!("attachment.{}", extension.trim_start_matches('.'))
        } else {
            name.to_string()
        }
    }

    /// Best-effort MIME type from the attachment category and extension
    pub fn mime_type(&self) -> String {
        let file_name = self.file_name();
        let extension = self
            .extension
            .as_deref()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .or_else(|| file_name.rsplit_once('.').map(|(_, e)| e.to_lowercase()))
            .unwrap_or_default();

        let by_extension = match extension.as_str() {
            "jpg" | "jpeg" => Some("image/jpeg"),
            "png" => Some("image/png"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            "ogg" | "oga" | "opus" => Some("audio/ogg"),
            "mp3" => Some("audio/mpeg"),
            "m4a" => Some("audio/mp4"),
            "mp4" => Some("video/mp4"),
            "3gp" => Some("video/3gpp"),
            "pdf" => Some("application/pdf"),
            _ => None,
        };

        by_extension
            .or_else(|| match self.file_type.as_deref() {
                Some("image") => Some("image/jpeg"),
                Some("audio") => Some("audio/ogg"),
                Some("video") => Some("video/mp4"),
                _ => None,
            })
            .unwrap_or("application/octet-stream")
            .to_string()
    }
}

impl HelpdeskWebhookEvent {
    pub fn is_message_created(&self) -> bool {
        self.event == MESSAGE_CREATED
    }

    pub fn is_outgoing(&self) -> bool {
        self.message_type == Some(MessageType::Outgoing)
    }

    pub fn conversation_id(&self) -> Option<u64> {
        self.conversation.as_ref().map(|c| c.id)
    }

    pub fn inbox_id(&self) -> Option<u64> {
        self.inbox
            .as_ref()
            .map(|i| i.id)
            .or_else(|| self.conversation.as_ref().and_then(|c| c.inbox_id))
    }

    /// Contact of the conversation, when the event carries it
    pub fn contact(&self) -> Option<&ChatwootContact> {
        self.conversation
            .as_ref()
            .and_then(|c| c.meta.as_ref())
            .and_then(|m| m.sender.as_ref())
    }

    pub fn contact_id(&self) -> Option<u64> {
        self.conversation
            .as_ref()
            .and_then(|c| c.contact_inbox.as_ref())
            .and_then(|ci| ci.contact_id)
            .or_else(|| self.contact().map(|c| c.id))
    }

    /// Display name of the agent who wrote the message
    pub fn agent_name(&self) -> Option<&str> {
        let sender = self.sender.as_ref()?;
        if sender.sender_type.as_deref().is_some_and(|t| t == "contact") {
            return None;
        }
        sender
            .available_name
            .as_deref()
            .or(sender.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}
