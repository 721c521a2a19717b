//! Helpdesk port - Contacts, conversations and messages on the helpdesk side
//!
//! The resolvers only ever talk to the helpdesk through this trait, so the
//! matching and reuse rules stay independent of the concrete API.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use domain::{
    ContactId, ConversationId, ConversationStatus, InboxId, NewRemoteContact,
    NewRemoteConversation, RemoteContact, RemoteConversation,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApplicationError, ports::MediaPayload};

/// Who a helpdesk message is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDirection {
    /// Written by the contact (arrives from WhatsApp)
    Incoming,
    /// Written by an agent
    Outgoing,
}

/// A message to append to a helpdesk conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHelpdeskMessage {
    pub content: String,
    pub direction: MessageDirection,
    /// Private notes are only visible to agents
    pub private: bool,
    /// Channel-side id of the message, for deduplication on the helpdesk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
}

impl NewHelpdeskMessage {
    /// A message written by the contact
    #[must_use]
    pub fn incoming(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            direction: MessageDirection::Incoming,
            private: false,
            source_id: None,
        }
    }

    #[must_use]
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = Some(source_id.into());
        self
    }
}

/// Helpdesk operations needed by the bridge
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HelpdeskPort: Send + Sync {
    /// Structured search: contacts whose phone number equals any of `phones`
    ///
    /// `phones` are normalized digits; the adapter formats them as the
    /// helpdesk stores them.
    async fn filter_contacts(&self, phones: &[String]) -> Result<Vec<RemoteContact>, ApplicationError>;

    /// Free-text contact search, results in remote ordering
    async fn search_contacts(&self, query: &str) -> Result<Vec<RemoteContact>, ApplicationError>;

    async fn get_contact(&self, contact_id: ContactId) -> Result<RemoteContact, ApplicationError>;

    /// Create a contact attached to an inbox
    ///
    /// Fails with [`ApplicationError::DuplicateIdentity`] when the helpdesk
    /// already holds a contact with this phone number or identifier.
    async fn create_contact(
        &self,
        inbox_id: InboxId,
        contact: &NewRemoteContact,
    ) -> Result<RemoteContact, ApplicationError>;

    async fn list_contact_conversations(
        &self,
        contact_id: ContactId,
    ) -> Result<Vec<RemoteConversation>, ApplicationError>;

    async fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<RemoteConversation, ApplicationError>;

    async fn create_conversation(
        &self,
        conversation: &NewRemoteConversation,
    ) -> Result<RemoteConversation, ApplicationError>;

    async fn toggle_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), ApplicationError>;

    /// Append a text message, returning the helpdesk message id
    async fn create_message(
        &self,
        conversation_id: ConversationId,
        message: &NewHelpdeskMessage,
    ) -> Result<u64, ApplicationError>;

    /// Append a message carrying one attachment
    async fn create_message_with_attachment(
        &self,
        conversation_id: ConversationId,
        message: &NewHelpdeskMessage,
        attachment: MediaPayload,
    ) -> Result<u64, ApplicationError>;
}
