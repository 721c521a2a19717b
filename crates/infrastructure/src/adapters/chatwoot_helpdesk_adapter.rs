//! Chatwoot helpdesk adapter
//!
//! Implements the `HelpdeskPort` trait using the Chatwoot integration crate.
//! Reads are retried on transient failures; creates and message posts are
//! sent once.

use std::fmt;

use application::{
    error::ApplicationError,
    ports::{HelpdeskPort, MediaPayload, MessageDirection, NewHelpdeskMessage},
};
use async_trait::async_trait;
use domain::{
    ContactId, ConversationId, ConversationStatus, InboxId, NewRemoteContact,
    NewRemoteConversation, RemoteContact, RemoteConversation,
};
use integration_chatwoot::{
    AttachmentUpload, ChatwootClient, ChatwootClientConfig, ChatwootContact,
    ChatwootConversation, ChatwootError, CreateContactRequest, CreateConversationRequest,
    CreateMessageRequest, MessageType,
};
use tracing::{debug, instrument, warn};

use crate::retry::{RetryConfig, retry};

/// Adapter that implements `HelpdeskPort` using `ChatwootClient`
pub struct ChatwootHelpdeskAdapter {
    client: ChatwootClient,
    read_retry: RetryConfig,
}

impl ChatwootHelpdeskAdapter {
    pub fn new(config: ChatwootClientConfig) -> Result<Self, ChatwootError> {
        Ok(Self::from_client(ChatwootClient::new(config)?))
    }

    pub fn from_client(client: ChatwootClient) -> Self {
        Self {
            client,
            read_retry: RetryConfig::default(),
        }
    }

    /// Override the retry policy for idempotent reads
    #[must_use]
    pub fn with_read_retry(mut self, config: RetryConfig) -> Self {
        self.read_retry = config;
        self
    }

    pub const fn client(&self) -> &ChatwootClient {
        &self.client
    }
}

impl fmt::Debug for ChatwootHelpdeskAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatwootHelpdeskAdapter")
            .field("read_retry", &self.read_retry)
            .finish_non_exhaustive()
    }
}

/// Translate a client error into the application taxonomy
///
/// `entity` and `id` name the resource the call was about, so a 404 becomes
/// a `NotFound` the resolvers can recover from.
fn map_error(err: ChatwootError, entity: &str, id: impl fmt::Display) -> ApplicationError {
    if err.is_not_found() {
        return ApplicationError::not_found(entity, id);
    }
    if err.is_duplicate() {
        return ApplicationError::DuplicateIdentity(format!("{entity} {id}: {err}"));
    }
    if err.is_timeout() {
        return ApplicationError::Timeout(format!("{entity} {id}: {err}"));
    }
    if err.is_transient() {
        return ApplicationError::TransientRemote(format!("{entity} {id}: {err}"));
    }

    match err {
        ChatwootError::Api { status, .. } if (400..500).contains(&status) => {
            ApplicationError::Validation(format!("{entity} {id}: {err}"))
        },
        ChatwootError::Configuration(msg) => ApplicationError::Configuration(msg),
        other => ApplicationError::ExternalService(format!("Chatwoot {entity} {id}: {other}")),
    }
}

pub(crate) fn to_remote_contact(contact: ChatwootContact) -> RemoteContact {
    let is_group = contact.is_group();
    let mut remote = RemoteContact::new(
        ContactId::new(contact.id),
        contact.name.unwrap_or_default(),
    );
    if let Some(phone) = contact.phone_number.as_deref() {
        remote = remote.with_phone_number(phone);
    }
    if let Some(identifier) = contact.identifier {
        remote = remote.with_identifier(identifier);
    }
    if is_group {
        remote = remote.as_group();
    }
    remote
}

fn to_remote_conversation(conversation: &ChatwootConversation) -> RemoteConversation {
    let status = conversation
        .status
        .as_deref()
        .map_or(Ok(ConversationStatus::Open), str::parse::<ConversationStatus>)
        .unwrap_or_else(|e| {
            warn!(conversation_id = conversation.id, error = %e, "Unknown conversation status, assuming open");
            ConversationStatus::Open
        });

    let mut remote = RemoteConversation::new(
        ConversationId::new(conversation.id),
        InboxId::new(conversation.inbox_id),
        status,
    );
    if let Some(ts) = conversation.last_activity_at {
        remote = remote.with_last_activity(ts);
    }
    if let Some(contact_id) = conversation.contact_id() {
        remote = remote.with_contact(ContactId::new(contact_id));
    }
    remote
}

fn to_message_request(message: &NewHelpdeskMessage) -> CreateMessageRequest {
    CreateMessageRequest {
        content: message.content.clone(),
        message_type: match message.direction {
            MessageDirection::Incoming => MessageType::Incoming,
            MessageDirection::Outgoing => MessageType::Outgoing,
        },
        private: message.private,
        source_id: message.source_id.clone(),
    }
}

#[async_trait]
impl HelpdeskPort for ChatwootHelpdeskAdapter {
    #[instrument(skip(self))]
    async fn filter_contacts(&self, phones: &[String]) -> Result<Vec<RemoteContact>, ApplicationError> {
        let contacts = retry(&self.read_retry, "filter_contacts", || async move {
            self.client
                .filter_contacts(phones)
                .await
                .map_err(|e| map_error(e, "Contact filter", phones.join(",")))
        })
        .await?;

        Ok(contacts.into_iter().map(to_remote_contact).collect())
    }

    #[instrument(skip(self))]
    async fn search_contacts(&self, query: &str) -> Result<Vec<RemoteContact>, ApplicationError> {
        let contacts = retry(&self.read_retry, "search_contacts", || async move {
            self.client
                .search_contacts(query)
                .await
                .map_err(|e| map_error(e, "Contact search", query))
        })
        .await?;

        Ok(contacts.into_iter().map(to_remote_contact).collect())
    }

    #[instrument(skip(self), fields(contact_id = %contact_id))]
    async fn get_contact(&self, contact_id: ContactId) -> Result<RemoteContact, ApplicationError> {
        let contact = retry(&self.read_retry, "get_contact", || async move {
            self.client
                .get_contact(contact_id.get())
                .await
                .map_err(|e| map_error(e, "Contact", contact_id))
        })
        .await?;

        Ok(to_remote_contact(contact))
    }

    #[instrument(skip(self, contact), fields(identifier = %contact.identifier, inbox_id = %inbox_id))]
    async fn create_contact(
        &self,
        inbox_id: InboxId,
        contact: &NewRemoteContact,
    ) -> Result<RemoteContact, ApplicationError> {
        let request = CreateContactRequest {
            inbox_id: inbox_id.get(),
            name: contact.name.clone(),
            phone_number: contact.phone_number.clone(),
            identifier: contact.identifier.clone(),
            avatar_url: contact.avatar_url.clone(),
        };

        let created = self
            .client
            .create_contact(&request)
            .await
            .map_err(|e| map_error(e, "Contact", &contact.identifier))?;

        debug!(contact_id = created.id, "Helpdesk contact created");

        // The create response may omit the group marker; trust what we asked for
        let remote = to_remote_contact(created);
        Ok(if contact.is_group { remote.as_group() } else { remote })
    }

    #[instrument(skip(self), fields(contact_id = %contact_id))]
    async fn list_contact_conversations(
        &self,
        contact_id: ContactId,
    ) -> Result<Vec<RemoteConversation>, ApplicationError> {
        let conversations = retry(&self.read_retry, "list_contact_conversations", || async move {
            self.client
                .list_contact_conversations(contact_id.get())
                .await
                .map_err(|e| map_error(e, "Contact", contact_id))
        })
        .await?;

        Ok(conversations
            .iter()
            .map(|c| {
                let remote = to_remote_conversation(c);
                if remote.contact_id.is_none() {
                    remote.with_contact(contact_id)
                } else {
                    remote
                }
            })
            .collect())
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id))]
    async fn get_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<RemoteConversation, ApplicationError> {
        let conversation = retry(&self.read_retry, "get_conversation", || async move {
            self.client
                .get_conversation(conversation_id.get())
                .await
                .map_err(|e| map_error(e, "Conversation", conversation_id))
        })
        .await?;

        Ok(to_remote_conversation(&conversation))
    }

    #[instrument(skip(self, conversation), fields(contact_id = %conversation.contact_id, inbox_id = %conversation.inbox_id))]
    async fn create_conversation(
        &self,
        conversation: &NewRemoteConversation,
    ) -> Result<RemoteConversation, ApplicationError> {
        let request = CreateConversationRequest {
            inbox_id: conversation.inbox_id.get(),
            contact_id: conversation.contact_id.get(),
            source_id: conversation.source_id.clone(),
            status: conversation.status.map(|s| s.as_str().to_string()),
        };

        let created = self
            .client
            .create_conversation(&request)
            .await
            // A 404 here means the contact itself is gone
            .map_err(|e| map_error(e, "Contact", conversation.contact_id))?;

        let remote = to_remote_conversation(&created);
        debug!(conversation_id = %remote.id, status = %remote.status, "Helpdesk conversation created");

        Ok(if remote.contact_id.is_none() {
            remote.with_contact(conversation.contact_id)
        } else {
            remote
        })
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id, status = %status))]
    async fn toggle_conversation_status(
        &self,
        conversation_id: ConversationId,
        status: ConversationStatus,
    ) -> Result<(), ApplicationError> {
        let current = self
            .client
            .toggle_status(conversation_id.get(), status.as_str())
            .await
            .map_err(|e| map_error(e, "Conversation", conversation_id))?;

        if current != status.as_str() {
            warn!(requested = %status, current = %current, "Helpdesk reported a different status after toggle");
        }
        Ok(())
    }

    #[instrument(skip(self, message), fields(conversation_id = %conversation_id, direction = ?message.direction))]
    async fn create_message(
        &self,
        conversation_id: ConversationId,
        message: &NewHelpdeskMessage,
    ) -> Result<u64, ApplicationError> {
        let created = self
            .client
            .create_message(conversation_id.get(), &to_message_request(message))
            .await
            .map_err(|e| map_error(e, "Conversation", conversation_id))?;

        debug!(message_id = created.id, "Helpdesk message created");
        Ok(created.id)
    }

    #[instrument(skip(self, message, attachment), fields(conversation_id = %conversation_id, file_name = %attachment.file_name))]
    async fn create_message_with_attachment(
        &self,
        conversation_id: ConversationId,
        message: &NewHelpdeskMessage,
        attachment: MediaPayload,
    ) -> Result<u64, ApplicationError> {
        let mut request = to_message_request(message);
        if request.content.is_empty() {
            if let Some(caption) = &attachment.caption {
                request.content.clone_from(caption);
            }
        }

        let upload = AttachmentUpload {
            data: attachment.data,
            file_name: attachment.file_name,
            mime_type: attachment.mime_type,
        };

        let created = self
            .client
            .create_message_with_attachment(conversation_id.get(), &request, upload)
            .await
            .map_err(|e| map_error(e, "Conversation", conversation_id))?;

        debug!(message_id = created.id, "Helpdesk attachment message created");
        Ok(created.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, message: &str) -> ChatwootError {
        ChatwootError::Api {
            status,
            message: message.to_string(),
        }
    }

    #[test]
    fn not_found_keeps_entity_and_id() {
        let err = map_error(api(404, "missing"), "Conversation", 42);
        assert!(matches!(
            err,
            ApplicationError::NotFound { ref entity, ref id } if entity == "Conversation" && id == "42"
        ));
    }

    #[test]
    fn duplicate_create_maps_to_duplicate_identity() {
        let err = map_error(api(422, "Identifier has already been taken"), "Contact", "5511");
        assert!(err.is_duplicate_identity());
    }

    #[test]
    fn other_client_errors_are_validation() {
        let err = map_error(api(422, "Name can't be blank"), "Contact", "5511");
        assert!(matches!(err, ApplicationError::Validation(_)));

        let err = map_error(api(401, "Unauthorized"), "Contact", "5511");
        assert!(matches!(err, ApplicationError::Validation(_)));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = map_error(api(503, "down"), "Conversation", 1);
        assert!(matches!(err, ApplicationError::TransientRemote(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn malformed_responses_are_external_errors() {
        let err = map_error(
            ChatwootError::InvalidResponse("expected value".to_string()),
            "Contact",
            1,
        );
        assert!(matches!(err, ApplicationError::ExternalService(_)));
    }

    #[test]
    fn contact_conversion_normalizes_phone() {
        let remote = to_remote_contact(ChatwootContact {
            id: 9,
            name: Some("Maria".to_string()),
            phone_number: Some("+55 11 98765-4321".to_string()),
            identifier: None,
            email: None,
            thumbnail: None,
        });
        assert_eq!(remote.id, ContactId::new(9));
        assert_eq!(remote.phone_number.as_deref(), Some("5511987654321"));
        assert!(!remote.is_group);
    }

    #[test]
    fn group_contacts_are_flagged() {
        let remote = to_remote_contact(ChatwootContact {
            id: 4,
            name: None,
            phone_number: None,
            identifier: Some("1203630@g.us".to_string()),
            email: None,
            thumbnail: None,
        });
        assert!(remote.is_group);
        assert_eq!(remote.name, "");
    }

    #[test]
    fn unknown_status_defaults_to_open() {
        let conversation: ChatwootConversation = serde_json::from_value(serde_json::json!({
            "id": 5,
            "inbox_id": 2,
            "status": "archived",
            "last_activity_at": 1_700_000_000
        }))
        .unwrap();

        let remote = to_remote_conversation(&conversation);
        assert_eq!(remote.status, ConversationStatus::Open);
        assert_eq!(remote.last_activity_at, Some(1_700_000_000));
        assert_eq!(remote.inbox_id, InboxId::new(2));
    }

    #[test]
    fn outgoing_direction_maps_to_outgoing_type() {
        let message = NewHelpdeskMessage {
            content: "hi".to_string(),
            direction: MessageDirection::Outgoing,
            private: true,
            source_id: None,
        };
        let request = to_message_request(&message);
        assert_eq!(request.message_type, MessageType::Outgoing);
        assert!(request.private);
    }
}
