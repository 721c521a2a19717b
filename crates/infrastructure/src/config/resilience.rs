//! Resilience configurations: media pipeline, circuit breaker, read retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    adapters::{CircuitBreakerConfig, MediaPipelineConfig, RateLimiterConfig},
    retry::RetryConfig,
};

// ==============================
// Media Pipeline Configuration
// ==============================

/// Media transfer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAppConfig {
    /// Concurrent transfers for a batch (default: 3)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Start offset between workers in milliseconds (default: 250)
    #[serde(default = "default_stagger")]
    pub stagger_ms: u64,

    /// Budget for one item, download plus upload, in seconds (default: 120)
    #[serde(default = "default_item_timeout")]
    pub item_timeout_secs: u64,

    /// Transfers admitted per window (default: 10)
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: u32,

    /// Rate limit window in milliseconds (default: 1000)
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_ms: u64,

    /// Largest attachment fetched from a URL, in bytes (default: unlimited)
    #[serde(default)]
    pub max_download_bytes: Option<u64>,
}

const fn default_workers() -> usize {
    3
}

const fn default_stagger() -> u64 {
    250
}

const fn default_item_timeout() -> u64 {
    120
}

const fn default_rate_limit_max() -> u32 {
    10
}

const fn default_rate_limit_window() -> u64 {
    1_000
}

impl Default for MediaAppConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            stagger_ms: default_stagger(),
            item_timeout_secs: default_item_timeout(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_ms: default_rate_limit_window(),
            max_download_bytes: None,
        }
    }
}

impl MediaAppConfig {
    #[must_use]
    pub const fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_secs)
    }

    /// Combine with the breaker settings into the pipeline configuration
    #[must_use]
    pub const fn to_pipeline_config(&self, breaker: &CircuitBreakerAppConfig) -> MediaPipelineConfig {
        MediaPipelineConfig {
            workers: self.workers,
            stagger: Duration::from_millis(self.stagger_ms),
            item_timeout: self.item_timeout(),
            rate_limit: RateLimiterConfig {
                max_requests: self.rate_limit_max,
                window: Duration::from_millis(self.rate_limit_window_ms),
            },
            circuit_breaker: breaker.to_breaker_config(),
        }
    }
}

// ==============================
// Circuit Breaker Configuration
// ==============================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerAppConfig {
    /// Consecutive failures that open the breaker (default: 5)
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Cooldown before the trial call in seconds (default: 30)
    #[serde(default = "default_reset_timeout")]
    pub reset_timeout_secs: u64,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_reset_timeout() -> u64 {
    30
}

impl Default for CircuitBreakerAppConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout(),
        }
    }
}

impl CircuitBreakerAppConfig {
    #[must_use]
    pub const fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::custom(
            self.failure_threshold,
            Duration::from_secs(self.reset_timeout_secs),
        )
    }
}

// ==============================
// Retry Configuration
// ==============================

/// Retry policy for idempotent helpdesk reads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAppConfig {
    /// Initial delay before first retry in milliseconds (default: 100ms)
    #[serde(default = "default_retry_initial_delay")]
    pub initial_delay_ms: u64,

    /// Maximum delay between retries in milliseconds (default: 2000ms)
    #[serde(default = "default_retry_max_delay")]
    pub max_delay_ms: u64,

    /// Maximum number of retry attempts (default: 2)
    #[serde(default = "default_retry_max_retries")]
    pub max_retries: u32,
}

const fn default_retry_initial_delay() -> u64 {
    100
}

const fn default_retry_max_delay() -> u64 {
    2_000
}

const fn default_retry_max_retries() -> u32 {
    2
}

impl Default for RetryAppConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_retry_initial_delay(),
            max_delay_ms: default_retry_max_delay(),
            max_retries: default_retry_max_retries(),
        }
    }
}

impl RetryAppConfig {
    /// Convert to `retry::RetryConfig` for use with retry operations
    #[must_use]
    pub const fn to_retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.initial_delay_ms, self.max_delay_ms, self.max_retries)
    }
}
