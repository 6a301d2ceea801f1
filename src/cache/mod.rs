//! Response cache.
//!
//! Read endpoints wrap their payload builders in [`ResponseCache::get_or_build`].
//! Entries are keyed by namespace, request path, the shared generation token
//! and the code version, and carry a soft and a hard expiry:
//!
//! - **Fresh**: served as is.
//! - **Stale**: served, and one detached task rebuilds it.
//! - **Expired**: rebuilt inline unless another caller is already rebuilding,
//!   in which case the expired payload is served.
//! - **Missing**: rebuilt inline; stored only by the lock holder.
//!
//! Writes go through [`CacheTrigger`], which bumps the generation.
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "memory"
//! soft_ttl_seconds = 120
//! hard_ttl_seconds = 3600
//! ```

mod config;
mod entry;
mod generation;
mod keys;
mod response;
mod single_flight;
mod store;
mod trigger;

pub use config::{CacheBackend, CacheConfig};
pub use entry::{CacheEntry, CachedPayload, EntryState};
pub use generation::GenerationCounter;
pub use keys::{CacheKey, GENERATION_KEY};
pub use response::{CachedBuildError, Clock, ResponseCache, SystemClock};
pub use single_flight::RefreshLock;
pub use store::{CacheError, CacheStore, MemoryCacheStore};
pub use trigger::{CacheTrigger, ChangeKind};
