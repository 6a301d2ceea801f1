//! Post-write cache hook.
//!
//! Admin services call [`CacheTrigger::content_changed`] after every
//! successful write. Invalidation is a generation bump; no key is deleted.

use tracing::debug;

use super::response::ResponseCache;
use super::store::CacheError;

/// What a write touched. Only used for logging; every change bumps the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Tag,
    Content,
    Speaker,
    Manual,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Tag => "tag",
            ChangeKind::Content => "content",
            ChangeKind::Speaker => "speaker",
            ChangeKind::Manual => "manual",
        }
    }
}

#[derive(Clone)]
pub struct CacheTrigger {
    cache: ResponseCache,
}

impl CacheTrigger {
    pub fn new(cache: ResponseCache) -> Self {
        Self { cache }
    }

    pub async fn content_changed(&self, change: ChangeKind) -> Result<(), CacheError> {
        if !self.cache.config().is_enabled() {
            debug!(change = change.as_str(), "Cache trigger skipped: cache disabled");
            return Ok(());
        }

        self.cache.generation().bump().await?;
        Ok(())
    }
}
