//! Chat mapping stores
//!
//! SQLite-backed store for deployments that survive restarts, and an
//! in-memory store for tests and ephemeral runs.

use std::{collections::HashMap, sync::Arc};

use application::{error::ApplicationError, ports::ChatMappingStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ChatId, ChatMapping, ContactId, ConversationId};
use parking_lot::RwLock;
use rusqlite::{OptionalExtension, Row, params};
use tokio::task;
use tracing::{debug, instrument};

use super::connection::{ConnectionPool, DatabaseError};

/// SQLite-based chat mapping store
#[derive(Debug, Clone)]
pub struct SqliteChatMappingStore {
    pool: Arc<ConnectionPool>,
}

impl SqliteChatMappingStore {
    #[must_use]
    pub const fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    /// Run a blocking closure against a pooled connection
    async fn with_connection<T, F>(&self, f: F) -> Result<T, ApplicationError>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        task::spawn_blocking(move || {
            let conn = pool.get().map_err(DatabaseError::from)?;
            f(&conn)
        })
        .await
        .map_err(|e| ApplicationError::Internal(e.to_string()))?
        .map_err(ApplicationError::from)
    }
}

fn row_to_mapping(row: &Row<'_>) -> Result<(String, i64, i64, String), rusqlite::Error> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_mapping(
    (chat_id, contact_id, conversation_id, updated_at): (String, i64, i64, String),
) -> Result<ChatMapping, DatabaseError> {
    let id = |value: i64, column: &str| {
        u64::try_from(value)
            .map_err(|_| DatabaseError::Corrupt(format!("{column} {value} for chat {chat_id}")))
    };

    Ok(ChatMapping {
        chat_id: ChatId::new(chat_id.as_str()).map_err(|e| DatabaseError::Corrupt(e.to_string()))?,
        contact_id: ContactId::new(id(contact_id, "contact_id")?),
        conversation_id: ConversationId::new(id(conversation_id, "conversation_id")?),
        updated_at: DateTime::parse_from_rfc3339(&updated_at)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| DatabaseError::Corrupt(format!("updated_at for chat {chat_id}: {e}")))?,
    })
}

fn to_column(value: u64) -> Result<i64, DatabaseError> {
    i64::try_from(value).map_err(|_| DatabaseError::Corrupt(format!("id {value} exceeds SQLite range")))
}

#[async_trait]
impl ChatMappingStore for SqliteChatMappingStore {
    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn get(&self, chat_id: &ChatId) -> Result<Option<ChatMapping>, ApplicationError> {
        let key = chat_id.as_str().to_string();

        self.with_connection(move |conn| {
            let row = conn
                .query_row(
                    "SELECT chat_id, contact_id, conversation_id, updated_at
                     FROM chat_mappings WHERE chat_id = ?1",
                    [&key],
                    row_to_mapping,
                )
                .optional()?;

            row.map(to_mapping).transpose()
        })
        .await
    }

    #[instrument(skip(self, mapping), fields(chat_id = %mapping.chat_id, conversation_id = %mapping.conversation_id))]
    async fn upsert(&self, mapping: &ChatMapping) -> Result<(), ApplicationError> {
        let mapping = mapping.clone();

        self.with_connection(move |conn| {
            conn.execute(
                "INSERT INTO chat_mappings (chat_id, contact_id, conversation_id, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(chat_id) DO UPDATE SET
                     contact_id = excluded.contact_id,
                     conversation_id = excluded.conversation_id,
                     updated_at = excluded.updated_at",
                params![
                    mapping.chat_id.as_str(),
                    to_column(mapping.contact_id.get())?,
                    to_column(mapping.conversation_id.get())?,
                    mapping.updated_at.to_rfc3339(),
                ],
            )?;
            debug!("Chat mapping stored");
            Ok(())
        })
        .await
    }

    #[instrument(skip(self), fields(chat_id = %chat_id))]
    async fn remove(&self, chat_id: &ChatId) -> Result<bool, ApplicationError> {
        let key = chat_id.as_str().to_string();

        self.with_connection(move |conn| {
            let removed = conn.execute("DELETE FROM chat_mappings WHERE chat_id = ?1", [&key])?;
            Ok(removed > 0)
        })
        .await
    }
}

/// Chat mappings held in process memory
#[derive(Debug, Default)]
pub struct InMemoryChatMappingStore {
    entries: RwLock<HashMap<ChatId, ChatMapping>>,
}

impl InMemoryChatMappingStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl ChatMappingStore for InMemoryChatMappingStore {
    async fn get(&self, chat_id: &ChatId) -> Result<Option<ChatMapping>, ApplicationError> {
        Ok(self.entries.read().get(chat_id).cloned())
    }

    async fn upsert(&self, mapping: &ChatMapping) -> Result<(), ApplicationError> {
        self.entries
            .write()
            .insert(mapping.chat_id.clone(), mapping.clone());
        Ok(())
    }

    async fn remove(&self, chat_id: &ChatId) -> Result<bool, ApplicationError> {
        Ok(self.entries.write().remove(chat_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DatabaseConfig, persistence::create_pool};

    fn sqlite_store() -> SqliteChatMappingStore {
        let pool = create_pool(&DatabaseConfig {
            path: ":memory:".to_string(),
            max_connections: 1,
            run_migrations: true,
        })
        .unwrap();
        SqliteChatMappingStore::new(Arc::new(pool))
    }

    fn mapping(chat: &str, contact: u64, conversation: u64) -> ChatMapping {
        ChatMapping::new(
            ChatId::new(chat).unwrap(),
            ContactId::new(contact),
            ConversationId::new(conversation),
        )
    }

    #[tokio::test]
    async fn sqlite_upsert_then_get() {
        let store = sqlite_store();
        let stored = mapping("5511987654321", 10, 20);
        store.upsert(&stored).await.unwrap();

        let loaded = store.get(&stored.chat_id).await.unwrap().unwrap();
        assert_eq!(loaded.contact_id, ContactId::new(10));
        assert_eq!(loaded.conversation_id, ConversationId::new(20));
        assert_eq!(loaded.updated_at.timestamp(), stored.updated_at.timestamp());
    }

    #[tokio::test]
    async fn sqlite_upsert_replaces_existing() {
        let store = sqlite_store();
        store.upsert(&mapping("chat-a", 1, 2)).await.unwrap();
        store.upsert(&mapping("chat-a", 1, 3)).await.unwrap();

        let loaded = store
            .get(&ChatId::new("chat-a").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.conversation_id, ConversationId::new(3));
    }

    #[tokio::test]
    async fn sqlite_missing_is_none() {
        let store = sqlite_store();
        assert!(store.get(&ChatId::new("nobody").unwrap()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn sqlite_remove_reports_existence() {
        let store = sqlite_store();
        let chat = ChatId::new("120363012345@g.us").unwrap();
        store.upsert(&mapping(chat.as_str(), 4, 5)).await.unwrap();

        assert!(store.remove(&chat).await.unwrap());
        assert!(!store.remove(&chat).await.unwrap());
        assert!(store.get(&chat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = InMemoryChatMappingStore::new();
        assert!(store.is_empty());

        store.upsert(&mapping("chat-b", 7, 8)).await.unwrap();
        store.upsert(&mapping("chat-b", 7, 9)).await.unwrap();
        assert_eq!(store.len(), 1);

        let chat = ChatId::new("chat-b").unwrap();
        assert_eq!(
            store.get(&chat).await.unwrap().unwrap().conversation_id,
            ConversationId::new(9)
        );
        assert!(store.remove(&chat).await.unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn corrupt_ids_are_rejected() {
        let err = to_mapping((
            "chat".to_string(),
            -1,
            2,
            "2026-01-01T00:00:00Z".to_string(),
        ))
        .unwrap_err();
        assert!(matches!(err, DatabaseError::Corrupt(_)));
    }
}
