//! Per-key refresh lock built on the store's atomic `add`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tracing::warn;
use uuid::Uuid;

use super::store::{CacheError, CacheStore};

/// Held while one caller rebuilds an entry. Dropping it without calling
/// [`RefreshLock::release`] still removes the lock on a best-effort basis;
/// the lock's own TTL covers the rest.
///
/// Release only deletes the lock while it still carries this holder's token,
/// so a holder that outlived its TTL cannot free a successor's lock.
pub struct RefreshLock {
    store: Arc<dyn CacheStore>,
    key: String,
    token: Value,
    released: bool,
}

impl RefreshLock {
    /// `None` when another caller already holds the lock.
    pub async fn try_acquire(
        store: &Arc<dyn CacheStore>,
        key: String,
        timeout: Duration,
    ) -> Result<Option<Self>, CacheError> {
        let token = Value::String(Uuid::new_v4().to_string());
        if !store.add(&key, token.clone(), Some(timeout)).await? {
            return Ok(None);
        }

        Ok(Some(Self {
            store: store.clone(),
            key,
            token,
            released: false,
        }))
    }

    pub async fn release(mut self) -> Result<(), CacheError> {
        self.released = true;
        if !self.store.delete_if(&self.key, &self.token).await? {
            warn!(
                target = "clubsite::cache::single_flight",
                key = %self.key,
                "Refresh lock expired before release; left to its new holder"
            );
        }
        Ok(())
    }
}

impl Drop for RefreshLock {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!(
                target = "clubsite::cache::single_flight",
                key = %self.key,
                "Refresh lock dropped outside a runtime; it will expire on its own"
            );
            return;
        };

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = self.token.take();
        handle.spawn(async move {
            if let Err(err) = store.delete_if(&key, &token).await {
                warn!(
                    target = "clubsite::cache::single_flight",
                    key = %key,
                    error = %err,
                    "Failed to release refresh lock"
                );
            }
        });
    }
}
