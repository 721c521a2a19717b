//! Application configuration
//!
//! Split into focused sub-modules:
//! - `integrations`: Chatwoot and WhatsApp endpoints and credentials
//! - `bridge`: conversation reuse policy, agent signatures
//! - `cache`: resolution cache TTLs
//! - `resilience`: media pipeline, circuit breaker, read retries
//! - `database`: SQLite mapping store

mod bridge;
mod cache;
mod database;
mod integrations;
mod resilience;

use application::ApplicationError;
use serde::{Deserialize, Serialize};

pub use bridge::BridgeAppConfig;
pub use cache::CacheConfig;
pub use database::DatabaseConfig;
pub use integrations::{ChatwootAppConfig, WhatsAppAppConfig};
pub use resilience::{CircuitBreakerAppConfig, MediaAppConfig, RetryAppConfig};

use crate::telemetry::TelemetryConfig;

/// Environment variable prefix (`WABRIDGE_CHATWOOT__API_TOKEN`)
pub const ENV_PREFIX: &str = "WABRIDGE";

/// Shared default for boolean `true` fields across config structs
pub(crate) const fn default_true() -> bool {
    true
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Helpdesk connection
    #[serde(default)]
    pub chatwoot: ChatwootAppConfig,

    /// Gateway connection
    #[serde(default)]
    pub whatsapp: WhatsAppAppConfig,

    /// Bridge behavior
    #[serde(default)]
    pub bridge: BridgeAppConfig,

    /// Resolution cache TTLs
    #[serde(default)]
    pub cache: CacheConfig,

    /// Media pipeline
    #[serde(default)]
    pub media: MediaAppConfig,

    /// Circuit breakers of the media pipeline
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerAppConfig,

    /// Retries of idempotent helpdesk reads
    #[serde(default)]
    pub retry: RetryAppConfig,

    /// Chat mapping store
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from `config.toml` (optional) and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(config::File::with_name("config").required(false))
    }

    /// Load configuration from `source`, overridden by the environment
    ///
    /// Nested keys are separated by `__` so that keys containing `_` stay
    /// unambiguous: `WABRIDGE_MEDIA__ITEM_TIMEOUT_SECS=60`.
    pub fn load_from<S>(source: S) -> Result<Self, config::ConfigError>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let builder = config::Config::builder()
            .add_source(source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Check that every required setting is present
    ///
    /// All problems are reported at once.
    pub fn validate(&self) -> Result<(), ApplicationError> {
        let mut problems = self.chatwoot.problems();
        problems.extend(self.whatsapp.problems());

        if self.media.workers == 0 {
            problems.push("media.workers must be at least 1".to_string());
        }
        if self.media.rate_limit_max == 0 {
            problems.push("media.rate_limit_max must be at least 1".to_string());
        }
        if self.circuit_breaker.failure_threshold == 0 {
            problems.push("circuit_breaker.failure_threshold must be at least 1".to_string());
        }
        if self.database.max_connections == 0 {
            problems.push("database.max_connections must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApplicationError::Configuration(problems.join("; ")))
        }
    }
}
