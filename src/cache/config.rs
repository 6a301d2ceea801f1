//! Cache configuration.
//!
//! Controls the response cache via the `[cache]` settings section.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SOFT_TTL: Duration = Duration::from_secs(120);
const DEFAULT_HARD_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MEMORY_CAPACITY: usize = 2048;

/// Where cache entries, locks and the generation token live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Postgres,
}

impl CacheBackend {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheBackend::Memory => "memory",
            CacheBackend::Postgres => "postgres",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// When false every read runs its builder and nothing is stored.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Age after which an entry is served stale and refreshed in the background.
    pub soft_ttl: Duration,
    /// Age after which an entry is only served when a rebuild is already underway.
    pub hard_ttl: Duration,
    /// Lifetime of a refresh lock; bounds how long a crashed builder blocks refreshes.
    pub lock_timeout: Duration,
    /// Maximum entries held by the in-process store.
    pub memory_capacity: usize,
    /// Mixed into every key so a deploy never reads entries built by older code.
    pub code_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Memory,
            soft_ttl: DEFAULT_SOFT_TTL,
            hard_ttl: DEFAULT_HARD_TTL,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            code_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            soft_ttl: Duration::from_secs(settings.soft_ttl_seconds.get()),
            hard_ttl: Duration::from_secs(settings.hard_ttl_seconds.get()),
            lock_timeout: Duration::from_secs(settings.lock_timeout_seconds.get()),
            memory_capacity: settings.memory_capacity,
            code_version: settings.code_version.clone(),
        }
    }
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// How long the store keeps an entry physically.
    ///
    /// Entries outlive their hard expiry so an expired payload can still be
    /// served while another caller rebuilds it.
    pub fn retention(&self) -> Duration {
        self.hard_ttl.saturating_mul(2)
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
