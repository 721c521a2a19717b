//! Bridge behavior: conversation reuse policy and agent signatures.

use std::time::Duration;

use application::services::{BridgeConfig, ConversationPolicy};
use domain::InboxId;
use serde::{Deserialize, Serialize};

use super::default_true;

/// Bridge behavior configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeAppConfig {
    /// Reuse and reopen resolved conversations instead of creating new ones
    #[serde(default)]
    pub reopen_conversation: bool,

    /// Create (and reopen) conversations as `pending`
    #[serde(default)]
    pub conversation_pending: bool,

    /// Budget for the background mapping write in milliseconds (default: 5000)
    #[serde(default = "default_mapping_write_timeout")]
    pub mapping_write_timeout_ms: u64,

    /// Prefix agent replies with the agent's name (default: true)
    #[serde(default = "default_true")]
    pub sign_agent_messages: bool,
}

const fn default_mapping_write_timeout() -> u64 {
    5_000
}

impl Default for BridgeAppConfig {
    fn default() -> Self {
        Self {
            reopen_conversation: false,
            conversation_pending: false,
            mapping_write_timeout_ms: default_mapping_write_timeout(),
            sign_agent_messages: true,
        }
    }
}

impl BridgeAppConfig {
    #[must_use]
    pub const fn conversation_policy(&self) -> ConversationPolicy {
        ConversationPolicy {
            reopen_resolved: self.reopen_conversation,
            pending_on_create: self.conversation_pending,
            mapping_write_timeout: Duration::from_millis(self.mapping_write_timeout_ms),
        }
    }

    #[must_use]
    pub const fn bridge_config(&self, inbox_id: InboxId) -> BridgeConfig {
        BridgeConfig {
            inbox_id,
            sign_agent_messages: self.sign_agent_messages,
        }
    }
}
