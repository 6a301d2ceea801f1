//! Stored cache entries and their freshness classification.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// A built response: JSON body plus the HTTP status it was served with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedPayload {
    pub status: u16,
    pub body: Value,
}

impl CachedPayload {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn with_status(status: u16, body: Value) -> Self {
        Self { status, body }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: CachedPayload,
    #[serde(with = "time::serde::rfc3339")]
    pub soft_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub hard_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl CacheEntry {
    pub fn new(
        payload: CachedPayload,
        now: OffsetDateTime,
        soft_ttl: Duration,
        hard_ttl: Duration,
    ) -> Self {
        Self {
            payload,
            soft_expires_at: now + soft_ttl,
            hard_expires_at: now + hard_ttl,
            generated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Missing,
    Fresh,
    Stale,
    Expired,
}

impl EntryState {
    pub fn classify(entry: Option<&CacheEntry>, now: OffsetDateTime) -> Self {
        match entry {
            None => EntryState::Missing,
            Some(entry) if now < entry.soft_expires_at => EntryState::Fresh,
            Some(entry) if now < entry.hard_expires_at => EntryState::Stale,
            Some(_) => EntryState::Expired,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Missing => "missing",
            EntryState::Fresh => "fresh",
            EntryState::Stale => "stale",
            EntryState::Expired => "expired",
        }
    }
}
