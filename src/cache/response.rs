//! Generation-stamped response cache with soft/hard expiry.
//!
//! `get_or_build` classifies the stored entry for a request and decides
//! whether to serve it, rebuild it inline, or serve it while a detached task
//! rebuilds it. Rebuilds are serialised per key by a [`RefreshLock`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::entry::{CacheEntry, CachedPayload, EntryState};
use super::generation::GenerationCounter;
use super::keys::CacheKey;
use super::single_flight::RefreshLock;
use super::store::{CacheError, CacheStore};

const METRIC_HIT: &str = "clubsite_cache_hit_total";
const METRIC_MISS: &str = "clubsite_cache_miss_total";
const METRIC_BUILD: &str = "clubsite_cache_build_total";
const METRIC_REFRESH: &str = "clubsite_cache_refresh_total";
const METRIC_CONTENDED: &str = "clubsite_cache_lock_contended_total";
const METRIC_BYPASS: &str = "clubsite_cache_bypass_total";
const METRIC_BUILD_MS: &str = "clubsite_cache_build_ms";

/// Source of "now" for entry classification.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Error)]
pub enum CachedBuildError<E> {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Build(E),
}

#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<Inner>,
}

struct Inner {
    config: CacheConfig,
    store: Arc<dyn CacheStore>,
    generation: GenerationCounter,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: CacheConfig,
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let generation = GenerationCounter::new(store.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                generation,
                clock,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn generation(&self) -> &GenerationCounter {
        &self.inner.generation
    }

    /// Key the entry for `namespace` and `path` currently lives under.
    pub async fn current_key(&self, namespace: &str, path: &str) -> Result<CacheKey, CacheError> {
        let generation = self.inner.generation.current().await?;
        Ok(CacheKey::derive(
            namespace,
            path,
            &generation,
            &self.inner.config.code_version,
        ))
    }

    /// Serve the payload for `path`, running `builder` only when needed.
    pub async fn get_or_build<F, Fut, E>(
        &self,
        namespace: &str,
        path: &str,
        builder: F,
    ) -> Result<CachedPayload, CachedBuildError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CachedPayload, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.inner.config.is_enabled() {
            counter!(METRIC_BYPASS).increment(1);
            return builder().await.map_err(CachedBuildError::Build);
        }

        let key = self.current_key(namespace, path).await?;
        let entry = self.load(&key).await?;
        let state = EntryState::classify(entry.as_ref(), self.inner.clock.now());
        debug!(
            target = "clubsite::cache::response",
            namespace,
            path,
            state = state.as_str(),
            "Cache lookup"
        );

        match (state, entry) {
            (EntryState::Fresh, Some(entry)) => {
                counter!(METRIC_HIT, "state" => "fresh").increment(1);
                Ok(entry.payload)
            }
            (EntryState::Stale, Some(entry)) => {
                counter!(METRIC_HIT, "state" => "stale").increment(1);
                if let Some(lock) = self.try_lock(&key).await? {
                    self.spawn_refresh(key, lock, builder);
                }
                Ok(entry.payload)
            }
            (EntryState::Expired, Some(entry)) => match self.try_lock(&key).await? {
                Some(lock) => {
                    counter!(METRIC_MISS, "state" => "expired").increment(1);
                    self.build_and_store(&key, lock, builder).await
                }
                None => {
                    counter!(METRIC_HIT, "state" => "expired").increment(1);
                    Ok(entry.payload)
                }
            },
            _ => {
                counter!(METRIC_MISS, "state" => "missing").increment(1);
                match self.try_lock(&key).await? {
                    Some(lock) => {
                        // A holder that finished between our lookup and lock already stored it.
                        if let Some(entry) = self.load(&key).await?
                            && EntryState::classify(Some(&entry), self.inner.clock.now())
                                == EntryState::Fresh
                        {
                            lock.release().await?;
                            return Ok(entry.payload);
                        }
                        self.build_and_store(&key, lock, builder).await
                    }
                    None => {
                        let started = Instant::now();
                        let result = builder().await.map_err(CachedBuildError::Build);
                        record_build(started, "uncached");
                        result
                    }
                }
            }
        }
    }

    async fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let Some(raw) = self.inner.store.get(&key.entry_key()).await? else {
            return Ok(None);
        };
        match serde_json::from_value::<CacheEntry>(raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                warn!(
                    target = "clubsite::cache::response",
                    key = key.digest(),
                    error = %err,
                    "Discarding undecodable cache entry"
                );
                Ok(None)
            }
        }
    }

    async fn try_lock(&self, key: &CacheKey) -> Result<Option<RefreshLock>, CacheError> {
        let lock = RefreshLock::try_acquire(
            &self.inner.store,
            key.lock_key(),
            self.inner.config.lock_timeout,
        )
        .await?;
        if lock.is_none() {
            counter!(METRIC_CONTENDED).increment(1);
            debug!(
                target = "clubsite::cache::response",
                key = key.digest(),
                "Refresh lock held elsewhere"
            );
        }
        Ok(lock)
    }

    async fn build_and_store<F, Fut, E>(
        &self,
        key: &CacheKey,
        lock: RefreshLock,
        builder: F,
    ) -> Result<CachedPayload, CachedBuildError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CachedPayload, E>>,
    {
        let started = Instant::now();
        let payload = match builder().await {
            Ok(payload) => payload,
            Err(err) => {
                record_build(started, "failed");
                lock.release().await?;
                return Err(CachedBuildError::Build(err));
            }
        };
        record_build(started, "stored");

        let stored = self.store_entry(key, &payload).await;
        let released = lock.release().await;
        stored?;
        released?;
        Ok(payload)
    }

    async fn store_entry(&self, key: &CacheKey, payload: &CachedPayload) -> Result<(), CacheError> {
        let config = &self.inner.config;
        let entry = CacheEntry::new(
            payload.clone(),
            self.inner.clock.now(),
            config.soft_ttl,
            config.hard_ttl,
        );
        let value = serde_json::to_value(&entry)?;
        self.inner
            .store
            .set(&key.entry_key(), value, Some(config.retention()))
            .await
    }

    fn spawn_refresh<F, Fut, E>(&self, key: CacheKey, lock: RefreshLock, builder: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<CachedPayload, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        counter!(METRIC_REFRESH).increment(1);
        let cache = self.clone();
        tokio::spawn(async move {
            match cache.build_and_store(&key, lock, builder).await {
                Ok(_) => debug!(
                    target = "clubsite::cache::response",
                    key = key.digest(),
                    "Background refresh stored"
                ),
                Err(err) => warn!(
                    target = "clubsite::cache::response",
                    key = key.digest(),
                    error = %err,
                    "Background refresh failed"
                ),
            }
        });
    }
}

fn record_build(started: Instant, outcome: &'static str) {
    counter!(METRIC_BUILD, "outcome" => outcome).increment(1);
    histogram!(METRIC_BUILD_MS).record(started.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;
    use time::macros::datetime;

    use super::*;
    use crate::cache::store::MemoryCacheStore;

    struct ManualClock(Mutex<OffsetDateTime>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().expect("clock");
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().expect("clock")
        }
    }

    fn cache() -> (ResponseCache, Arc<ManualClock>, Arc<MemoryCacheStore>) {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryCacheStore::new(&config));
        let clock = Arc::new(ManualClock(Mutex::new(datetime!(2024-03-01 09:00 UTC))));
        let cache = ResponseCache::with_clock(config, store.clone(), clock.clone());
        (cache, clock, store)
    }

    fn counting(
        calls: &Arc<AtomicUsize>,
        body: serde_json::Value,
    ) -> impl FnOnce() -> std::future::Ready<Result<CachedPayload, Infallible>> + Send + 'static
    {
        let calls = calls.clone();
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(CachedPayload::ok(body)))
        }
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_building() {
        let (cache, _clock, _store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_build("tags", "/api/tags/", counting(&calls, json!({"n": 1})))
            .await
            .expect("first");
        let second = cache
            .get_or_build("tags", "/api/tags/", counting(&calls, json!({"n": 2})))
            .await
            .expect("second");

        assert_eq!(first.body, json!({"n": 1}));
        assert_eq!(second.body, json!({"n": 1}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bumping_the_generation_forces_a_rebuild() {
        let (cache, _clock, _store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));

        let before = cache.current_key("tags", "/api/tags/").await.expect("key");
        cache
            .get_or_build("tags", "/api/tags/", counting(&calls, json!(1)))
            .await
            .expect("build");
        cache.generation().bump().await.expect("bump");
        let after = cache.current_key("tags", "/api/tags/").await.expect("key");
        let rebuilt = cache
            .get_or_build("tags", "/api/tags/", counting(&calls, json!(2)))
            .await
            .expect("rebuild");

        assert_ne!(before, after);
        assert_eq!(rebuilt.body, json!(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_entry_with_lock_held_builds_without_storing() {
        let (cache, _clock, store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = cache.current_key("items", "/api/items/").await.expect("key");
        store
            .add(&key.lock_key(), json!("other"), Some(Duration::from_secs(30)))
            .await
            .expect("lock");

        let payload = cache
            .get_or_build("items", "/api/items/", counting(&calls, json!("local")))
            .await
            .expect("build");

        assert_eq!(payload.body, json!("local"));
        assert_eq!(store.get(&key.entry_key()).await.expect("get"), None);
    }

    #[tokio::test]
    async fn stale_entries_are_served_and_refreshed_in_background() {
        let (cache, clock, store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_build("items", "/api/items/", counting(&calls, json!("old")))
            .await
            .expect("build");

        clock.advance(Duration::from_secs(121));
        let served = cache
            .get_or_build("items", "/api/items/", counting(&calls, json!("new")))
            .await
            .expect("stale");
        assert_eq!(served.body, json!("old"));

        let key = cache.current_key("items", "/api/items/").await.expect("key");
        for _ in 0..50 {
            if store.get(&key.lock_key()).await.expect("get").is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }

        let refreshed = cache
            .get_or_build("items", "/api/items/", counting(&calls, json!("newer")))
            .await
            .expect("fresh");
        assert_eq!(refreshed.body, json!("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entry_is_served_while_another_caller_rebuilds() {
        let (cache, clock, store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        cache
            .get_or_build("search", "/api/search/?q=pi", counting(&calls, json!("v1")))
            .await
            .expect("build");

        clock.advance(Duration::from_secs(3601));
        let key = cache
            .current_key("search", "/api/search/?q=pi")
            .await
            .expect("key");
        store
            .add(&key.lock_key(), json!("other"), Some(Duration::from_secs(30)))
            .await
            .expect("lock");

        let served = cache
            .get_or_build("search", "/api/search/?q=pi", counting(&calls, json!("v2")))
            .await
            .expect("expired");
        assert_eq!(served.body, json!("v1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        store.delete(&key.lock_key()).await.expect("unlock");
        let rebuilt = cache
            .get_or_build("search", "/api/search/?q=pi", counting(&calls, json!("v3")))
            .await
            .expect("rebuild");
        assert_eq!(rebuilt.body, json!("v3"));
    }

    #[derive(Debug, thiserror::Error)]
    #[error("builder exploded")]
    struct Boom;

    #[tokio::test]
    async fn builder_errors_propagate_and_release_the_lock() {
        let (cache, _clock, store) = cache();

        let result = cache
            .get_or_build("bootstrap", "/api/bootstrap/", || async {
                Err::<CachedPayload, _>(Boom)
            })
            .await;
        assert!(matches!(result, Err(CachedBuildError::Build(Boom))));

        let key = cache
            .current_key("bootstrap", "/api/bootstrap/")
            .await
            .expect("key");
        assert_eq!(store.get(&key.lock_key()).await.expect("get"), None);
        assert_eq!(store.get(&key.entry_key()).await.expect("get"), None);
    }

    #[tokio::test]
    async fn error_statuses_are_cached_like_any_payload() {
        let (cache, _clock, _store) = cache();
        let calls = Arc::new(AtomicUsize::new(0));
        let not_found = {
            let calls = calls.clone();
            move || {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, Infallible>(CachedPayload::with_status(
                    404,
                    json!({"detail": "Not found."}),
                )))
            }
        };

        let first = cache
            .get_or_build("tag_detail", "/api/tags/nope/", not_found)
            .await
            .expect("first");
        let second = cache
            .get_or_build(
                "tag_detail",
                "/api/tags/nope/",
                counting(&calls, json!("unused")),
            )
            .await
            .expect("second");

        assert_eq!(first.status, 404);
        assert_eq!(second.status, 404);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_cache_always_builds() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let store = Arc::new(MemoryCacheStore::new(&config));
        let cache = ResponseCache::new(config, store.clone());
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            cache
                .get_or_build("tags", "/api/tags/", counting(&calls, json!(null)))
                .await
                .expect("build");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(store.is_empty());
    }
}
