//! Cache storage backends.
//!
//! A store is a flat key/value map of JSON values with optional per-key
//! expiry. `add` and `delete_if` are the atomic primitives the cache relies
//! on: insert when absent (or expired), and delete only a value still owned.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use tracing::warn;

use super::config::CacheConfig;
use super::keys::is_control_key;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {message}")]
    Store { message: String },
    #[error("cache entry could not be encoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store {
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;
    /// Overwrite `key`. `None` keeps the value until it is replaced or evicted.
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;
    /// Insert only when `key` is absent. Returns whether the value was written.
    async fn add(&self, key: &str, value: Value, ttl: Option<Duration>)
    -> Result<bool, CacheError>;
    async fn delete(&self, key: &str) -> Result<(), CacheError>;
    /// Delete `key` only while it still holds `expected`. Returns whether it did.
    async fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, CacheError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: Value,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|deadline| now < deadline)
    }
}

/// Responses live in the bounded LRU. The generation token and locks sit in
/// a separate map so response churn can never evict them.
struct Slots {
    responses: LruCache<String, StoredValue>,
    control: HashMap<String, StoredValue>,
}

impl Slots {
    fn peek(&self, key: &str) -> Option<&StoredValue> {
        if is_control_key(key) {
            self.control.get(key)
        } else {
            self.responses.peek(key)
        }
    }

    /// Live value for `key`, dropping it when expired.
    fn get(&mut self, key: &str, now: Instant) -> Option<Value> {
        let live = if is_control_key(key) {
            self.control.get(key).map(|stored| stored.is_live(now))
        } else {
            self.responses.get(key).map(|stored| stored.is_live(now))
        };
        match live {
            Some(true) => self.peek(key).map(|stored| stored.value.clone()),
            Some(false) => {
                self.remove(key);
                None
            }
            None => None,
        }
    }

    fn put(&mut self, key: &str, stored: StoredValue, now: Instant) {
        if is_control_key(key) {
            self.control.retain(|_, existing| existing.is_live(now));
            self.control.insert(key.to_string(), stored);
        } else {
            self.responses.put(key.to_string(), stored);
        }
    }

    fn remove(&mut self, key: &str) -> Option<StoredValue> {
        if is_control_key(key) {
            self.control.remove(key)
        } else {
            self.responses.pop(key)
        }
    }

    fn len(&self) -> usize {
        self.responses.len() + self.control.len()
    }
}

/// In-process store backed by a bounded LRU map.
pub struct MemoryCacheStore {
    slots: Mutex<Slots>,
}

impl MemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            slots: Mutex::new(Slots {
                responses: LruCache::new(config.memory_capacity_non_zero()),
                control: HashMap::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.slots("len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while holding the map leaves it usable; entries stay valid JSON.
    fn slots(&self, op: &'static str) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!(
                target = "clubsite::cache",
                op,
                "Recovered poisoned memory cache store"
            );
            poisoned.into_inner()
        })
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.slots("get").get(key, Instant::now()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = ttl.map(|ttl| now + ttl);
        self.slots("set")
            .put(key, StoredValue { value, expires_at }, now);
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut slots = self.slots("add");
        if slots.peek(key).is_some_and(|stored| stored.is_live(now)) {
            return Ok(false);
        }
        slots.put(
            key,
            StoredValue {
                value,
                expires_at: ttl.map(|ttl| now + ttl),
            },
            now,
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.slots("delete").remove(key);
        Ok(())
    }

    async fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut slots = self.slots("delete_if");
        let matches = slots
            .peek(key)
            .is_some_and(|stored| stored.is_live(now) && &stored.value == expected);
        if matches {
            slots.remove(key);
        }
        Ok(matches)
    }
}
