//! Infrastructure layer - Adapters for external systems
//!
//! Implements ports defined in the application layer: the Chatwoot and
//! WhatsApp adapters, the media dispatch pipeline, resolution caches and the
//! SQLite chat mapping store.

pub mod adapters;
pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod persistence;
pub mod retry;
pub mod telemetry;

pub use adapters::*;
pub use bootstrap::BridgeRuntime;
pub use cache::{ResolutionCache, ResolutionCacheConfig, SweeperHandle, TtlCache};
pub use config::{
    AppConfig, BridgeAppConfig, CacheConfig, ChatwootAppConfig, CircuitBreakerAppConfig,
    DatabaseConfig, MediaAppConfig, RetryAppConfig, WhatsAppAppConfig,
};
pub use persistence::{
    ConnectionPool, DatabaseError, InMemoryChatMappingStore, SqliteChatMappingStore, create_pool,
};
pub use retry::{RetryConfig, RetryResult, Retryable, retry, with_retry};
pub use telemetry::{TelemetryConfig, TelemetryError, init_telemetry};
