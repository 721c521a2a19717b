//! Resolution cache port
//!
//! Typed cache for the two entity kinds the resolvers look up on every
//! message. Lookups are in-memory, so the trait is synchronous.

#[cfg(test)]
use mockall::automock;

use domain::{ConversationId, RemoteContact, RemoteConversation};

/// Cache for resolved contacts and conversations
///
/// Contacts are keyed by a caller-chosen string (normalized identity or
/// numeric id), conversations by their id. Expired entries read as misses.
#[cfg_attr(test, automock)]
pub trait ResolutionCachePort: Send + Sync {
    fn get_contact(&self, key: &str) -> Option<RemoteContact>;

    fn put_contact(&self, key: &str, contact: RemoteContact);

    fn invalidate_contact(&self, key: &str);

    fn get_conversation(&self, conversation_id: ConversationId) -> Option<RemoteConversation>;

    fn put_conversation(&self, conversation: RemoteConversation);

    fn invalidate_conversation(&self, conversation_id: ConversationId);

    /// Drop every entry of both partitions
    fn clear(&self);

    fn stats(&self) -> CacheStats;
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses (including expired reads)
    pub misses: u64,
    /// Current number of contact entries
    pub contacts: u64,
    /// Current number of conversation entries
    pub conversations: u64,
    /// Entries removed because they expired
    pub expired: u64,
}

impl CacheStats {
    /// Calculate the hit rate as a fraction (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            // Precision loss is acceptable for statistics display
            self.hits as f64 / total as f64
        }
    }

    pub const fn entries(&self) -> u64 {
        self.contacts + self.conversations
    }
}
