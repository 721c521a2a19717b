//! Cache implementations
//!
//! - `TtlCache`: generic in-memory cache with per-entry expiry
//! - `ResolutionCache`: contact and conversation partitions for the resolvers

mod resolution_cache;
mod ttl_cache;

pub use resolution_cache::{ResolutionCache, ResolutionCacheConfig, SweeperHandle};
pub use ttl_cache::{TtlCache, TtlCacheCounters};
