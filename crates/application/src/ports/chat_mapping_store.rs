//! Chat mapping store port
//!
//! Persists which helpdesk contact and conversation a chat thread was last
//! resolved to. Implementations must provide read-your-writes per chat id.

#[cfg(test)]
use mockall::automock;

use async_trait::async_trait;
use domain::{ChatId, ChatMapping};

use crate::error::ApplicationError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChatMappingStore: Send + Sync {
    async fn get(&self, chat_id: &ChatId) -> Result<Option<ChatMapping>, ApplicationError>;

    /// Insert or replace the mapping for `mapping.chat_id`
    async fn upsert(&self, mapping: &ChatMapping) -> Result<(), ApplicationError>;

    /// Remove a mapping, returning whether one existed
    async fn remove(&self, chat_id: &ChatId) -> Result<bool, ApplicationError>;
}
