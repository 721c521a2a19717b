//! Infrastructure adapters
//!
//! Adapters connect application ports to concrete implementations, plus the
//! resilience primitives (rate limiter, circuit breaker) the media pipeline
//! is built from.

mod chatwoot_helpdesk_adapter;
pub mod circuit_breaker;
mod http_media_fetcher;
mod media_pipeline;
pub mod rate_limiter;
mod webhook_translation;
mod whatsapp_message_source_adapter;

pub use chatwoot_helpdesk_adapter::ChatwootHelpdeskAdapter;
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitOpenError, CircuitState,
};
pub use http_media_fetcher::HttpMediaFetcher;
pub use media_pipeline::{MediaPipeline, MediaPipelineConfig};
pub use rate_limiter::{RateLimiterConfig, SlidingWindowRateLimiter};
pub use webhook_translation::{inbound_from_whatsapp, outbound_from_helpdesk};
pub use whatsapp_message_source_adapter::WhatsAppMessageSourceAdapter;
