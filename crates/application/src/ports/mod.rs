//! Port definitions for application layer
//!
//! Ports are interfaces that define how the application interacts with
//! external systems. Adapters in the infrastructure layer implement these ports.

mod chat_mapping_store;
mod helpdesk_port;
mod media_dispatch_port;
mod media_fetch_port;
mod message_source_port;
mod resolution_cache_port;

pub use chat_mapping_store::ChatMappingStore;
#[cfg(test)]
pub use chat_mapping_store::MockChatMappingStore;
#[cfg(test)]
pub use helpdesk_port::MockHelpdeskPort;
pub use helpdesk_port::{HelpdeskPort, MessageDirection, NewHelpdeskMessage};
#[cfg(test)]
pub use media_dispatch_port::MockMediaDispatchPort;
pub use media_dispatch_port::{DispatchReport, DispatchTarget, MediaDispatchPort};
#[cfg(test)]
pub use media_fetch_port::MockMediaFetchPort;
pub use media_fetch_port::MediaFetchPort;
#[cfg(test)]
pub use message_source_port::MockMessageSourcePort;
pub use message_source_port::{DownloadedMedia, MediaPayload, MessageSourcePort, send_media};
#[cfg(test)]
pub use resolution_cache_port::MockResolutionCachePort;
pub use resolution_cache_port::{CacheStats, ResolutionCachePort};
