//! Shared cache store on the `cache_entries` table.
//!
//! Expiry is evaluated by the database clock so every process sharing the
//! table agrees on when a lock or entry lapses.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPool;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::{CacheError, CacheStore};

#[derive(Clone)]
pub struct PostgresCacheStore {
    pool: PgPool,
}

impl PostgresCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Drop rows whose expiry has passed. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64, CacheError> {
        let result = sqlx::query(
            "DELETE FROM cache_entries WHERE expires_at IS NOT NULL AND expires_at <= now()",
        )
        .execute(&self.pool)
        .await
        .map_err(CacheError::store)?;
        Ok(result.rows_affected())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `period` until the
    /// runtime shuts down.
    pub fn spawn_purge_task(&self, period: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired().await {
                    Ok(removed) => debug!(
                        target = "clubsite::cache",
                        removed,
                        "Purged expired cache rows"
                    ),
                    Err(err) => warn!(
                        target = "clubsite::cache",
                        error = %err,
                        "Purging expired cache rows failed"
                    ),
                }
            }
        })
    }
}

fn ttl_millis(ttl: Option<Duration>) -> Option<f64> {
    ttl.map(|ttl| ttl.as_secs_f64() * 1000.0)
}

#[async_trait]
impl CacheStore for PostgresCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let raw: Option<String> = sqlx::query_scalar(
            r#"
            SELECT value
            FROM cache_entries
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::store)?;

        raw.map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(CacheError::from)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let encoded = serde_json::to_string(&value)?;
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES ($1, $2, now() + ($3::float8 * INTERVAL '1 millisecond'))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(key)
        .bind(encoded)
        .bind(ttl_millis(ttl))
        .execute(&self.pool)
        .await
        .map_err(CacheError::store)?;
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: Value,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let encoded = serde_json::to_string(&value)?;
        // An expired row counts as absent and is taken over in place.
        let written: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO cache_entries (key, value, expires_at)
            VALUES ($1, $2, now() + ($3::float8 * INTERVAL '1 millisecond'))
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            WHERE cache_entries.expires_at IS NOT NULL AND cache_entries.expires_at <= now()
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(encoded)
        .bind(ttl_millis(ttl))
        .fetch_optional(&self.pool)
        .await
        .map_err(CacheError::store)?;

        Ok(written.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        sqlx::query("DELETE FROM cache_entries WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::store)?;
        Ok(())
    }

    async fn delete_if(&self, key: &str, expected: &Value) -> Result<bool, CacheError> {
        let encoded = serde_json::to_string(expected)?;
        let result = sqlx::query("DELETE FROM cache_entries WHERE key = $1 AND value = $2")
            .bind(key)
            .bind(encoded)
            .execute(&self.pool)
            .await
            .map_err(CacheError::store)?;
        Ok(result.rows_affected() > 0)
    }
}
