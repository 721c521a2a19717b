//! Resolution cache
//!
//! Contact and conversation partitions with independent TTLs. Conversations
//! expire sooner because their status and inbox change more often, and a
//! stale conversation is what sends messages to the wrong place.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use application::ports::{CacheStats, ResolutionCachePort};
use domain::{ConversationId, RemoteContact, RemoteConversation};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, instrument};

use super::TtlCache;

/// TTLs and sweep cadence
#[derive(Debug, Clone)]
pub struct ResolutionCacheConfig {
    pub contact_ttl: Duration,
    pub conversation_ttl: Duration,
    pub sweep_interval: Duration,
}

impl Default for ResolutionCacheConfig {
    fn default() -> Self {
        Self {
            contact_ttl: Duration::from_secs(30 * 60),
            conversation_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Owned per-instance cache for the resolvers
#[derive(Debug)]
pub struct ResolutionCache {
    contacts: TtlCache<String, RemoteContact>,
    conversations: TtlCache<ConversationId, RemoteConversation>,
    sweep_interval: Duration,
}

impl ResolutionCache {
    #[must_use]
    pub fn new(config: &ResolutionCacheConfig) -> Self {
        Self {
            contacts: TtlCache::new(config.contact_ttl),
            conversations: TtlCache::new(config.conversation_ttl),
            sweep_interval: config.sweep_interval,
        }
    }

    /// Drop expired entries from both partitions
    #[instrument(skip(self))]
    pub fn purge_expired(&self) -> usize {
        let removed = self.contacts.purge_expired() + self.conversations.purge_expired();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }

    /// Start the background sweep
    ///
    /// The task holds only a weak reference, so it ends when the cache is
    /// dropped, when `cancel` fires, or when the returned handle is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> SweeperHandle {
        let cache = Arc::downgrade(self);
        let interval = self.sweep_interval;
        let token = cancel.child_token();
        let task = tokio::spawn(sweep_loop(cache, interval, token.clone()));

        SweeperHandle {
            task,
            guard: token.drop_guard(),
        }
    }
}

async fn sweep_loop(cache: Weak<ResolutionCache>, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(cache) = cache.upgrade() else { break };
                cache.purge_expired();
            },
        }
    }
    debug!("Cache sweeper stopped");
}

/// Keeps the sweep task alive; dropping it stops the sweep
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
    guard: DropGuard,
}

impl SweeperHandle {
    /// Stop the sweep and wait for the task to finish
    pub async fn shutdown(self) {
        drop(self.guard);
        let _ = self.task.await;
    }
}

impl ResolutionCachePort for ResolutionCache {
    fn get_contact(&self, key: &str) -> Option<RemoteContact> {
        self.contacts.get(key)
    }

    fn put_contact(&self, key: &str, contact: RemoteContact) {
        self.contacts.insert(key.to_string(), contact);
    }

    fn invalidate_contact(&self, key: &str) {
        self.contacts.delete(key);
    }

    fn get_conversation(&self, conversation_id: ConversationId) -> Option<RemoteConversation> {
        self.conversations.get(&conversation_id)
    }

    fn put_conversation(&self, conversation: RemoteConversation) {
        self.conversations.insert(conversation.id, conversation);
    }

    fn invalidate_conversation(&self, conversation_id: ConversationId) {
        self.conversations.delete(&conversation_id);
    }

    fn clear(&self) {
        self.contacts.clear();
        self.conversations.clear();
    }

    fn stats(&self) -> CacheStats {
        let contacts = self.contacts.counters();
        let conversations = self.conversations.counters();
        CacheStats {
            hits: contacts.hits + conversations.hits,
            misses: contacts.misses + conversations.misses,
            contacts: contacts.entries,
            conversations: conversations.entries,
            expired: contacts.expired + conversations.expired,
        }
    }
}
