//! Media dispatch port - Move a batch of attachments to one destination

#[cfg(test)]
use mockall::automock;

use std::fmt;

use async_trait::async_trait;
use domain::{ConversationId, MediaItem, WhatsAppIdentity};
use tokio_util::sync::CancellationToken;

use crate::error::{ApplicationError, MediaFailure};

/// Where a batch of media ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// Attach to a helpdesk conversation as incoming messages
    Helpdesk { conversation_id: ConversationId },
    /// Send to a WhatsApp chat
    WhatsApp { recipient: WhatsAppIdentity },
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helpdesk { conversation_id } => write!(f, "conversation {conversation_id}"),
            Self::WhatsApp { recipient } => write!(f, "whatsapp {recipient}"),
        }
    }
}

/// Outcome of a dispatch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub total: usize,
    /// Failures in item order
    pub failures: Vec<MediaFailure>,
}

impl DispatchReport {
    pub const fn new(total: usize) -> Self {
        Self {
            total,
            failures: Vec::new(),
        }
    }

    pub fn delivered(&self) -> usize {
        self.total.saturating_sub(self.failures.len())
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Turn a report with failures into [`ApplicationError::MediaDispatch`]
    ///
    /// The representative error is the failure with the lowest index.
    pub fn into_result(mut self) -> Result<Self, ApplicationError> {
        if self.failures.is_empty() {
            return Ok(self);
        }
        self.failures.sort_by_key(|f| f.index);
        let failed = self.failures.len();
        let first = self.failures.swap_remove(0);
        Err(ApplicationError::MediaDispatch {
            failed,
            total: self.total,
            first,
        })
    }
}

/// Transfers attachments with bounded concurrency and failure isolation
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MediaDispatchPort: Send + Sync {
    /// Transfer `items` to `target`
    ///
    /// One item's failure never cancels the others. Returns the report when
    /// every item succeeded, otherwise the aggregated error.
    async fn dispatch(
        &self,
        target: DispatchTarget,
        items: Vec<MediaItem>,
        cancel: CancellationToken,
    ) -> Result<DispatchReport, ApplicationError>;
}
