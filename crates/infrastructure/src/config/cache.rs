//! Resolution cache configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::ResolutionCacheConfig;

/// TTLs of the contact and conversation partitions
///
/// Conversations change status far more often than contacts change
/// identity, so they expire sooner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Contact TTL in seconds (default: 30 minutes)
    #[serde(default = "default_contact_ttl")]
    pub contact_ttl_secs: u64,

    /// Conversation TTL in seconds (default: 5 minutes)
    #[serde(default = "default_conversation_ttl")]
    pub conversation_ttl_secs: u64,

    /// Interval of the expiry sweep in seconds (default: 60)
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

const fn default_contact_ttl() -> u64 {
    30 * 60
}

const fn default_conversation_ttl() -> u64 {
    5 * 60
}

const fn default_sweep_interval() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            contact_ttl_secs: default_contact_ttl(),
            conversation_ttl_secs: default_conversation_ttl(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub const fn to_resolution_cache_config(&self) -> ResolutionCacheConfig {
        ResolutionCacheConfig {
            contact_ttl: Duration::from_secs(self.contact_ttl_secs),
            conversation_ttl: Duration::from_secs(self.conversation_ttl_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}
