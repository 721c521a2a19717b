//! Conversation thread as the helpdesk knows it

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    errors::DomainError,
    value_objects::{ContactId, ConversationId, InboxId},
};

/// Lifecycle status of a helpdesk conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationStatus {
    Open,
    Pending,
    Resolved,
    Snoozed,
}

impl ConversationStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Snoozed => "snoozed",
        }
    }
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversationStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "pending" => Ok(Self::Pending),
            "resolved" => Ok(Self::Resolved),
            "snoozed" => Ok(Self::Snoozed),
            other => Err(DomainError::ValidationError(format!(
                "unknown conversation status: {other}"
            ))),
        }
    }
}

/// A conversation in the helpdesk, tied to one contact and one inbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConversation {
    pub id: ConversationId,
    pub inbox_id: InboxId,
    pub status: ConversationStatus,
    /// Unix timestamp (seconds) of the last activity, when reported
    pub last_activity_at: Option<i64>,
    pub contact_id: Option<ContactId>,
}

impl RemoteConversation {
    pub const fn new(id: ConversationId, inbox_id: InboxId, status: ConversationStatus) -> Self {
        Self {
            id,
            inbox_id,
            status,
            last_activity_at: None,
            contact_id: None,
        }
    }

    #[must_use]
    pub const fn with_last_activity(mut self, timestamp: i64) -> Self {
        self.last_activity_at = Some(timestamp);
        self
    }

    #[must_use]
    pub const fn with_contact(mut self, contact_id: ContactId) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.status == ConversationStatus::Resolved
    }

    pub fn belongs_to(&self, inbox_id: InboxId) -> bool {
        self.inbox_id == inbox_id
    }

    /// Whether new messages for `inbox_id` may be attached to this conversation
    ///
    /// The inbox must match; a resolved conversation only qualifies when
    /// reopening is allowed.
    pub fn is_eligible(&self, inbox_id: InboxId, reopen_resolved: bool) -> bool {
        self.belongs_to(inbox_id) && (!self.is_resolved() || reopen_resolved)
    }
}

/// Attributes for creating a conversation remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteConversation {
    pub contact_id: ContactId,
    pub inbox_id: InboxId,
    /// Initial status; `None` leaves the helpdesk default
    pub status: Option<ConversationStatus>,
    /// Channel-side identifier of the thread (the chat id)
    pub source_id: Option<String>,
}
