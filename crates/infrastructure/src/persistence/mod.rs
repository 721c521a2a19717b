//! Persistence module
//!
//! SQLite-based storage for chat mappings.

pub mod chat_mapping_store;
pub mod connection;
pub mod migrations;

pub use chat_mapping_store::{InMemoryChatMappingStore, SqliteChatMappingStore};
pub use connection::{ConnectionPool, DatabaseError, create_pool};
