//! Application services

mod bridge_service;
mod conversation_resolver;
mod identity_resolver;

pub use bridge_service::{
    BridgeConfig, BridgeOutcome, BridgeService, InboundMessage, OutboundReply, SkipReason,
};
pub use conversation_resolver::{ConversationPolicy, ConversationResolver};
pub use identity_resolver::IdentityResolver;

/// In-memory stand-ins for the cache and mapping store
#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use domain::{ChatId, ChatMapping, ConversationId, RemoteContact, RemoteConversation};
    use parking_lot::Mutex;

    use crate::{
        error::ApplicationError,
        ports::{CacheStats, ChatMappingStore, ResolutionCachePort},
    };

    #[derive(Debug, Default)]
    pub struct FakeCache {
        contacts: Mutex<HashMap<String, RemoteContact>>,
        conversations: Mutex<HashMap<ConversationId, RemoteConversation>>,
    }

    impl ResolutionCachePort for FakeCache {
        fn get_contact(&self, key: &str) -> Option<RemoteContact> {
            self.contacts.lock().get(key).cloned()
        }

        fn put_contact(&self, key: &str, contact: RemoteContact) {
            self.contacts.lock().insert(key.to_string(), contact);
        }

        fn invalidate_contact(&self, key: &str) {
            self.contacts.lock().remove(key);
        }

        fn get_conversation(&self, conversation_id: ConversationId) -> Option<RemoteConversation> {
            self.conversations.lock().get(&conversation_id).cloned()
        }

        fn put_conversation(&self, conversation: RemoteConversation) {
            self.conversations
                .lock()
                .insert(conversation.id, conversation);
        }

        fn invalidate_conversation(&self, conversation_id: ConversationId) {
            self.conversations.lock().remove(&conversation_id);
        }

        fn clear(&self) {
            self.contacts.lock().clear();
            self.conversations.lock().clear();
        }

        fn stats(&self) -> CacheStats {
            CacheStats {
                contacts: self.contacts.lock().len() as u64,
                conversations: self.conversations.lock().len() as u64,
                ..CacheStats::default()
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct MemoryMappings {
        entries: Mutex<HashMap<ChatId, ChatMapping>>,
    }

    impl MemoryMappings {
        pub fn insert(&self, mapping: ChatMapping) {
            self.entries.lock().insert(mapping.chat_id.clone(), mapping);
        }

        pub fn snapshot(&self, chat_id: &ChatId) -> Option<ChatMapping> {
            self.entries.lock().get(chat_id).cloned()
        }
    }

    #[async_trait]
    impl ChatMappingStore for MemoryMappings {
        async fn get(&self, chat_id: &ChatId) -> Result<Option<ChatMapping>, ApplicationError> {
            Ok(self.snapshot(chat_id))
        }

        async fn upsert(&self, mapping: &ChatMapping) -> Result<(), ApplicationError> {
            self.insert(mapping.clone());
            Ok(())
        }

        async fn remove(&self, chat_id: &ChatId) -> Result<bool, ApplicationError> {
            Ok(self.entries.lock().remove(chat_id).is_some())
        }
    }
}
