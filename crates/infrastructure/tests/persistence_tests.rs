//! Integration tests for the SQLite chat mapping store
//!
//! These tests use file-backed databases so that mappings are checked across
//! pool restarts.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use application::ports::ChatMappingStore;
use domain::{ChatId, ChatMapping, ContactId, ConversationId};
use infrastructure::{DatabaseConfig, SqliteChatMappingStore, create_pool};

fn file_config(dir: &tempfile::TempDir) -> DatabaseConfig {
    DatabaseConfig {
        path: dir.path().join("bridge.db").to_string_lossy().into_owned(),
        max_connections: 4,
        run_migrations: true,
    }
}

fn open_store(config: &DatabaseConfig) -> SqliteChatMappingStore {
    let pool = create_pool(config).expect("Failed to create pool");
    SqliteChatMappingStore::new(Arc::new(pool))
}

#[tokio::test]
async fn mappings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let config = file_config(&dir);
    let chat = ChatId::new("5511987654321").unwrap();

    {
        let store = open_store(&config);
        store
            .upsert(&ChatMapping::new(
                chat.clone(),
                ContactId::new(42),
                ConversationId::new(7),
            ))
            .await
            .unwrap();
    }

    let store = open_store(&config);
    let mapping = store.get(&chat).await.unwrap().expect("mapping persisted");
    assert_eq!(mapping.contact_id, ContactId::new(42));
    assert_eq!(mapping.conversation_id, ConversationId::new(7));
}

#[tokio::test]
async fn concurrent_upserts_keep_one_row_per_chat() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(open_store(&file_config(&dir)));
    let chat = ChatId::new("120363012345@g.us").unwrap();

    let mut tasks = tokio::task::JoinSet::new();
    for conversation in 1..=8 {
        let store = Arc::clone(&store);
        let chat = chat.clone();
        tasks.spawn(async move {
            store
                .upsert(&ChatMapping::new(
                    chat,
                    ContactId::new(3),
                    ConversationId::new(conversation),
                ))
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap().unwrap();
    }

    let mapping = store.get(&chat).await.unwrap().unwrap();
    assert!((1..=8).contains(&mapping.conversation_id.get()));
    assert!(store.remove(&chat).await.unwrap());
    assert!(store.get(&chat).await.unwrap().is_none());
}
