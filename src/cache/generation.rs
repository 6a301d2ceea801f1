//! Process-wide cache generation token.
//!
//! The token lives in the shared store so every process using that store
//! sees the same generation. It has no expiry; a bump overwrites it.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::keys::GENERATION_KEY;
use super::store::{CacheError, CacheStore};

const METRIC_GENERATION_BUMP: &str = "clubsite_cache_generation_bump_total";

#[derive(Clone)]
pub struct GenerationCounter {
    store: Arc<dyn CacheStore>,
}

impl GenerationCounter {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// The current token, creating one when the store has none.
    pub async fn current(&self) -> Result<String, CacheError> {
        if let Some(token) = self.read().await? {
            return Ok(token);
        }

        let token = new_token();
        if self
            .store
            .add(GENERATION_KEY, Value::String(token.clone()), None)
            .await?
        {
            return Ok(token);
        }

        // Another caller initialised it first.
        Ok(self.read().await?.unwrap_or(token))
    }

    /// Replace the token, obsoleting every key derived from the previous one.
    pub async fn bump(&self) -> Result<String, CacheError> {
        let token = new_token();
        self.store
            .set(GENERATION_KEY, Value::String(token.clone()), None)
            .await?;
        counter!(METRIC_GENERATION_BUMP).increment(1);
        info!(
            target = "clubsite::cache::generation",
            generation = %token,
            "Cache generation advanced"
        );
        Ok(token)
    }

    async fn read(&self) -> Result<Option<String>, CacheError> {
        Ok(match self.store.get(GENERATION_KEY).await? {
            Some(Value::String(token)) => Some(token),
            Some(other) => Some(other.to_string()),
            None => None,
        })
    }
}

/// Time-ordered prefix plus a random suffix so tokens never repeat.
fn new_token() -> String {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    format!("{nanos:x}-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::config::CacheConfig;
    use crate::cache::store::MemoryCacheStore;

    fn counter() -> GenerationCounter {
        GenerationCounter::new(Arc::new(MemoryCacheStore::new(&CacheConfig::default())))
    }

    #[tokio::test]
    async fn current_is_stable_until_bumped() {
        let generation = counter();
        let first = generation.current().await.expect("current");
        assert_eq!(generation.current().await.expect("current"), first);

        let bumped = generation.bump().await.expect("bump");
        assert_ne!(bumped, first);
        assert_eq!(generation.current().await.expect("current"), bumped);
    }

    #[tokio::test]
    async fn consecutive_bumps_are_unique() {
        let generation = counter();
        let a = generation.bump().await.expect("bump");
        let b = generation.bump().await.expect("bump");
        assert_ne!(a, b);
    }
}
