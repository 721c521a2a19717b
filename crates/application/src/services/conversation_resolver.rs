//! Conversation resolver
//!
//! Picks the helpdesk conversation a chat thread's messages go to. A
//! persisted mapping is tried first, then the contact's most recently active
//! eligible conversation, and finally a new conversation is created. A
//! conversation from a different inbox is never returned.

use std::{fmt, sync::Arc, time::Duration};

use domain::{
    ChatId, ChatMapping, ContactId, ConversationId, ConversationStatus, InboxId,
    NewRemoteConversation, RemoteContact, RemoteConversation,
};
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, instrument, warn};

use crate::{
    error::ApplicationError,
    ports::{ChatMappingStore, HelpdeskPort, ResolutionCachePort},
};

/// Reuse and creation policy for conversations
#[derive(Debug, Clone)]
pub struct ConversationPolicy {
    /// Reuse `resolved` conversations (and reopen them) instead of creating new ones
    pub reopen_resolved: bool,
    /// Create new conversations as `pending` instead of the helpdesk default
    pub pending_on_create: bool,
    /// Upper bound for the background mapping write
    pub mapping_write_timeout: Duration,
}

impl Default for ConversationPolicy {
    fn default() -> Self {
        Self {
            reopen_resolved: false,
            pending_on_create: false,
            mapping_write_timeout: Duration::from_secs(5),
        }
    }
}

impl ConversationPolicy {
    /// Status a reopened conversation is switched to
    const fn reopen_status(&self) -> ConversationStatus {
        if self.pending_on_create {
            ConversationStatus::Pending
        } else {
            ConversationStatus::Open
        }
    }
}

/// Resolves chat threads to helpdesk conversations
pub struct ConversationResolver {
    helpdesk: Arc<dyn HelpdeskPort>,
    mappings: Arc<dyn ChatMappingStore>,
    cache: Arc<dyn ResolutionCachePort>,
    policy: ConversationPolicy,
    mapping_writes: TaskTracker,
}

impl fmt::Debug for ConversationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversationResolver")
            .field("policy", &self.policy)
            .field("pending_mapping_writes", &self.mapping_writes.len())
            .finish_non_exhaustive()
    }
}

impl ConversationResolver {
    pub fn new(
        helpdesk: Arc<dyn HelpdeskPort>,
        mappings: Arc<dyn ChatMappingStore>,
        cache: Arc<dyn ResolutionCachePort>,
        policy: ConversationPolicy,
    ) -> Self {
        Self {
            helpdesk,
            mappings,
            cache,
            policy,
            mapping_writes: TaskTracker::new(),
        }
    }

    pub const fn policy(&self) -> &ConversationPolicy {
        &self.policy
    }

    /// Find or create the conversation for `chat_id` in `inbox_id`
    ///
    /// The mapping is persisted in the background; a second resolution for
    /// the same chat that starts before the write lands may not see it.
    #[instrument(skip(self, contact), fields(chat_id = %chat_id, contact_id = %contact.id, inbox_id = %inbox_id))]
    pub async fn resolve(
        &self,
        chat_id: &ChatId,
        contact: &RemoteContact,
        inbox_id: InboxId,
    ) -> Result<RemoteConversation, ApplicationError> {
        if let Some(conversation) = self.from_mapping(chat_id, contact.id, inbox_id).await? {
            debug!(conversation_id = %conversation.id, "Reusing mapped conversation");
            return Ok(self.reopen_if_resolved(conversation).await);
        }

        let conversation = match self.discover(contact.id, inbox_id).await? {
            Some(conversation) => {
                debug!(conversation_id = %conversation.id, "Reusing most recent conversation");
                self.reopen_if_resolved(conversation).await
            },
            None => self.create(chat_id, contact.id, inbox_id).await?,
        };

        self.persist_mapping(ChatMapping::new(chat_id.clone(), contact.id, conversation.id));
        Ok(conversation)
    }

    /// Conversation an agent reply belongs to, checked against `inbox_id`
    #[instrument(skip(self))]
    pub async fn conversation_for_recipient(
        &self,
        conversation_id: ConversationId,
        inbox_id: InboxId,
    ) -> Result<RemoteConversation, ApplicationError> {
        let conversation = self.fetch(conversation_id).await?;
        if !conversation.belongs_to(inbox_id) {
            return Err(ApplicationError::Validation(format!(
                "conversation {conversation_id} belongs to inbox {}, not {inbox_id}",
                conversation.inbox_id
            )));
        }
        Ok(conversation)
    }

    /// Drop a conversation from the cache after it turned out to be stale
    pub fn invalidate(&self, conversation_id: ConversationId) {
        self.cache.invalidate_conversation(conversation_id);
    }

    /// Wait until every background mapping write has finished
    pub async fn flush_mapping_writes(&self) {
        self.mapping_writes.close();
        self.mapping_writes.wait().await;
        self.mapping_writes.reopen();
    }

    async fn from_mapping(
        &self,
        chat_id: &ChatId,
        contact_id: ContactId,
        inbox_id: InboxId,
    ) -> Result<Option<RemoteConversation>, ApplicationError> {
        let mapping = match self.mappings.get(chat_id).await {
            Ok(Some(mapping)) => mapping,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(error = %e, "Failed to read chat mapping");
                return Ok(None);
            },
        };

        if mapping.contact_id != contact_id {
            debug!(mapped_contact = %mapping.contact_id, "Mapping belongs to another contact");
            return Ok(None);
        }

        let conversation = match self.fetch(mapping.conversation_id).await {
            Ok(conversation) => conversation,
            Err(e) if e.is_not_found() => {
                info!(conversation_id = %mapping.conversation_id, "Mapped conversation no longer exists");
                return Ok(None);
            },
            Err(e) => return Err(e),
        };

        if !conversation.belongs_to(inbox_id) {
            warn!(
                conversation_id = %conversation.id,
                conversation_inbox = %conversation.inbox_id,
                "Mapped conversation belongs to another inbox"
            );
            return Ok(None);
        }

        if conversation.is_resolved() && !self.policy.reopen_resolved {
            debug!(conversation_id = %conversation.id, "Mapped conversation is resolved");
            return Ok(None);
        }

        Ok(Some(conversation))
    }

    /// Most recently active eligible conversation of the contact
    async fn discover(
        &self,
        contact_id: ContactId,
        inbox_id: InboxId,
    ) -> Result<Option<RemoteConversation>, ApplicationError> {
        let conversations = self
            .helpdesk
            .list_contact_conversations(contact_id)
            .await
            .map_err(|e| e.context(format!("list conversations of contact {contact_id}")))?;

        let eligible: Vec<_> = conversations
            .into_iter()
            .filter(|c| c.is_eligible(inbox_id, self.policy.reopen_resolved))
            .collect();

        let chosen = eligible
            .iter()
            .filter(|c| c.last_activity_at.is_some())
            .max_by_key(|c| c.last_activity_at)
            .or_else(|| eligible.first())
            .cloned();

        if let Some(conversation) = &chosen {
            self.cache.put_conversation(conversation.clone());
        }
        Ok(chosen)
    }

    async fn create(
        &self,
        chat_id: &ChatId,
        contact_id: ContactId,
        inbox_id: InboxId,
    ) -> Result<RemoteConversation, ApplicationError> {
        let request = NewRemoteConversation {
            contact_id,
            inbox_id,
            status: self
                .policy
                .pending_on_create
                .then_some(ConversationStatus::Pending),
            source_id: Some(chat_id.to_string()),
        };

        let conversation = self
            .helpdesk
            .create_conversation(&request)
            .await
            .map_err(|e| e.context(format!("create conversation for contact {contact_id}")))?;

        info!(conversation_id = %conversation.id, status = %conversation.status, "Created conversation");
        self.cache.put_conversation(conversation.clone());
        Ok(conversation)
    }

    async fn fetch(
        &self,
        conversation_id: ConversationId,
    ) -> Result<RemoteConversation, ApplicationError> {
        if let Some(conversation) = self.cache.get_conversation(conversation_id) {
            return Ok(conversation);
        }

        match self.helpdesk.get_conversation(conversation_id).await {
            Ok(conversation) => {
                self.cache.put_conversation(conversation.clone());
                Ok(conversation)
            },
            Err(e) => {
                self.cache.invalidate_conversation(conversation_id);
                Err(e.context(format!("get conversation {conversation_id}")))
            },
        }
    }

    /// Switch a reused resolved conversation back to open
    ///
    /// A failed toggle is logged; messages still land in the conversation.
    async fn reopen_if_resolved(&self, mut conversation: RemoteConversation) -> RemoteConversation {
        if !conversation.is_resolved() {
            return conversation;
        }

        let status = self.policy.reopen_status();
        match self
            .helpdesk
            .toggle_conversation_status(conversation.id, status)
            .await
        {
            Ok(()) => {
                info!(conversation_id = %conversation.id, status = %status, "Reopened conversation");
                conversation.status = status;
                self.cache.put_conversation(conversation.clone());
            },
            Err(e) => {
                warn!(conversation_id = %conversation.id, error = %e, "Failed to reopen conversation");
                self.cache.invalidate_conversation(conversation.id);
            },
        }
        conversation
    }

    fn persist_mapping(&self, mapping: ChatMapping) {
        let store = Arc::clone(&self.mappings);
        let timeout = self.policy.mapping_write_timeout;
        let span = info_span!("persist_mapping", chat_id = %mapping.chat_id);

        self.mapping_writes.spawn(
            async move {
                match tokio::time::timeout(timeout, store.upsert(&mapping)).await {
                    Ok(Ok(())) => debug!(conversation_id = %mapping.conversation_id, "Chat mapping saved"),
                    Ok(Err(e)) => warn!(error = %e, "Failed to save chat mapping"),
                    Err(_) => warn!(timeout_ms = timeout.as_millis(), "Chat mapping write timed out"),
                }
            }
            .instrument(span),
        );
    }
}
