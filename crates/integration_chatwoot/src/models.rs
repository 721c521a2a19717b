//! Helpdesk API resources
//!
//! Response types decode leniently: everything except ids is optional,
//! since Chatwoot versions differ in which fields they include.

use serde::{Deserialize, Deserializer, Serialize};

/// Contact record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatwootContact {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl ChatwootContact {
    /// Contacts for group chats are registered with their group JID
    pub fn is_group(&self) -> bool {
        self.identifier
            .as_deref()
            .is_some_and(|id| id.ends_with("@g.us"))
    }
}

/// Conversation record
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatwootConversation {
    pub id: u64,
    pub inbox_id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<i64>,
    #[serde(default)]
    pub contact_inbox: Option<ContactInbox>,
    #[serde(default)]
    pub meta: Option<ConversationMeta>,
}

impl ChatwootConversation {
    /// Contact the conversation belongs to, from whichever block carries it
    pub fn contact_id(&self) -> Option<u64> {
        self.contact_inbox
            .as_ref()
            .and_then(|ci| ci.contact_id)
            .or_else(|| {
                self.meta
                    .as_ref()
                    .and_then(|m| m.sender.as_ref())
                    .map(|s| s.id)
            })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContactInbox {
    #[serde(default)]
    pub contact_id: Option<u64>,
    #[serde(default)]
    pub source_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationMeta {
    #[serde(default)]
    pub sender: Option<ChatwootContact>,
}

/// Created message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatwootMessage {
    pub id: u64,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub message_type: Option<MessageType>,
}

/// Direction of a helpdesk message
///
/// The REST API reports it as an integer, webhooks as a string; both decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Incoming,
    Outgoing,
    Activity,
    Template,
}

impl MessageType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Incoming => "incoming",
            Self::Outgoing => "outgoing",
            Self::Activity => "activity",
            Self::Template => "template",
        }
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Code(u8),
            Name(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Code(0) => Ok(Self::Incoming),
            Raw::Code(1) => Ok(Self::Outgoing),
            Raw::Code(2) => Ok(Self::Activity),
            Raw::Code(3) => Ok(Self::Template),
            Raw::Name(name) => match name.as_str() {
                "incoming" => Ok(Self::Incoming),
                "outgoing" => Ok(Self::Outgoing),
                "activity" => Ok(Self::Activity),
                "template" => Ok(Self::Template),
                other => Err(serde::de::Error::custom(format!(
                    "unknown message type: {other}"
                ))),
            },
            Raw::Code(other) => Err(serde::de::Error::custom(format!(
                "unknown message type code: {other}"
            ))),
        }
    }
}

/// Body of `POST /contacts`
#[derive(Debug, Clone, Serialize)]
pub struct CreateContactRequest {
    pub inbox_id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Body of `POST /conversations`
#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest {
    pub inbox_id: u64,
    pub contact_id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Body of `POST /conversations/{id}/messages`
#[derive(Debug, Clone, Serialize)]
pub struct CreateMessageRequest {
    pub content: String,
    pub message_type: MessageType,
    pub private: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

/// File attached to a created message
#[derive(Clone)]
pub struct AttachmentUpload {
    pub data: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl std::fmt::Debug for AttachmentUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttachmentUpload")
            .field("data", &format_args!("{} bytes", self.data.len()))
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListPayload<T> {
    #[serde(default = "Vec::new")]
    pub payload: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SinglePayload<T> {
    pub payload: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedContact {
    pub contact: ChatwootContact,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToggleStatusResult {
    #[serde(default)]
    pub current_status: Option<String>,
}
