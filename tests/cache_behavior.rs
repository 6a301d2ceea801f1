use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Barrier;

use clubsite::cache::{
    CacheConfig, CacheError, CacheStore, CachedPayload, MemoryCacheStore, ResponseCache,
};

const CALLERS: usize = 8;

fn memory_cache() -> (ResponseCache, Arc<MemoryCacheStore>) {
    let config = CacheConfig::default();
    let store = Arc::new(MemoryCacheStore::new(&config));
    (ResponseCache::new(config, store.clone()), store)
}

async fn slow_build(builds: Arc<AtomicUsize>, body: Value) -> Result<CachedPayload, Infallible> {
    builds.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(25)).await;
    Ok(CachedPayload::ok(body))
}

/// Memory store that counts writes per key and successful `add`s.
struct CountingStore {
    inner: MemoryCacheStore,
    sets: Mutex<HashMap<String, usize>>,
    adds_won: Mutex<HashMap<String, usize>>,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryCacheStore::new(&CacheConfig::default()),
            sets: Mutex::new(HashMap::new()),
            adds_won: Mutex::new(HashMap::new()),
        }
    }

    fn sets_of(&self, key: &str) -> usize {
        self.sets.lock().expect("sets").get(key).copied().unwrap_or(0)
    }

    fn adds_won_of(&self, key: &str) -> usize {
        self.adds_won
            .lock()
            .expect("adds")
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CacheStore for CountingStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        *self
            .sets
            .lock()
            .expect("sets")
            .entry(key.to_string())
            .or_default() += 1;
        self.inner.set(key, value, ttl).await
    }

    async fn add(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let won = self.inner.add(key, value, ttl).await?;
        if won {
            *self
                .adds_won
                .lock()
                .expect("adds")
                .entry(key.to_string())
                .or_default() += 1;
        }
        Ok(won)
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key).await
    }

    async fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, CacheError> {
        self.inner.delete_if(key, expected).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_store_exactly_once() {
    let store = Arc::new(CountingStore::new());
    let cache = ResponseCache::new(CacheConfig::default(), store.clone());
    let key = cache
        .current_key("items", "/api/items/?type=all")
        .await
        .expect("key");
    let builds = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let cache = cache.clone();
        let builds = builds.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            cache
                .get_or_build("items", "/api/items/?type=all", move || {
                    slow_build(builds, json!({ "items": [] }))
                })
                .await
        }));
    }

    for handle in handles {
        let payload = handle
            .await
            .expect("task should join")
            .expect("payload should build");
        assert_eq!(payload.status, 200);
        assert_eq!(payload.body, json!({ "items": [] }));
    }

    assert_eq!(store.sets_of(&key.entry_key()), 1);
    assert_eq!(store.adds_won_of(&key.lock_key()), 1);
    let first_round = builds.load(Ordering::SeqCst);
    assert!(first_round >= 1);

    // The stored payload serves the next caller without a rebuild.
    let payload = cache
        .get_or_build("items", "/api/items/?type=all", {
            let builds = builds.clone();
            move || slow_build(builds, json!({ "items": ["rebuilt"] }))
        })
        .await
        .expect("cached payload");
    assert_eq!(payload.body, json!({ "items": [] }));
    assert_eq!(builds.load(Ordering::SeqCst), first_round);
    assert_eq!(store.sets_of(&key.entry_key()), 1);
}

#[tokio::test]
async fn generation_bump_moves_every_key() {
    let (cache, store) = memory_cache();

    let before = cache
        .current_key("tags", "/api/tags/")
        .await
        .expect("key before");
    cache
        .get_or_build("tags", "/api/tags/", || async {
            Ok::<_, Infallible>(CachedPayload::ok(json!({ "tags": [] })))
        })
        .await
        .expect("payload");
    assert!(
        store
            .get(&before.entry_key())
            .await
            .expect("store read")
            .is_some()
    );

    cache.generation().bump().await.expect("bump");
    let after = cache
        .current_key("tags", "/api/tags/")
        .await
        .expect("key after");

    assert_ne!(before, after);
    assert!(
        store
            .get(&after.entry_key())
            .await
            .expect("store read")
            .is_none()
    );
}
