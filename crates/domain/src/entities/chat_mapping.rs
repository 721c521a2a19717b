//! Persisted association between a chat thread and its helpdesk counterpart

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::{ChatId, ContactId, ConversationId};

/// `chat_id → (contact, conversation)` as last resolved
///
/// A mapping can go stale when the conversation is deleted, resolved or moved
/// remotely, so it is a hint that must be revalidated before reuse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMapping {
    pub chat_id: ChatId,
    pub contact_id: ContactId,
    pub conversation_id: ConversationId,
    pub updated_at: DateTime<Utc>,
}

impl ChatMapping {
    pub fn new(chat_id: ChatId, contact_id: ContactId, conversation_id: ConversationId) -> Self {
        Self {
            chat_id,
            contact_id,
            conversation_id,
            updated_at: Utc::now(),
        }
    }
}
