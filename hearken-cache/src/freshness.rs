//! Entry freshness and the read wrapper handed to views.

use chrono::{DateTime, Utc};
use hearken_core::SyncError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::key::CacheKey;

/// Lifecycle status of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Fetched within its stale time and not invalidated since.
    Fresh,
    /// Past its stale time or invalidated; the next read refetches.
    Stale,
    /// A fetch for this key is in flight.
    Fetching,
    /// The last fetch failed.
    Error,
}

/// One keyed slot in the query cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: CacheKey,
    /// Last successfully fetched payload, kept through invalidation and errors.
    pub payload: Option<Arc<Value>>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub stale_time: Duration,
    status: EntryStatus,
    pub last_error: Option<SyncError>,
    /// Bumped on every new fetch, write, or invalidation.
    pub(crate) generation: u64,
    pub(crate) last_accessed: DateTime<Utc>,
    pub(crate) mounts: usize,
}

impl CacheEntry {
    pub(crate) fn new(key: CacheKey, stale_time: Duration, now: DateTime<Utc>) -> Self {
        Self {
            key,
            payload: None,
            fetched_at: None,
            stale_time,
            status: EntryStatus::Stale,
            last_error: None,
            generation: 0,
            last_accessed: now,
            mounts: 0,
        }
    }

    /// Status as observed at `now`; a Fresh entry whose stale time elapsed
    /// reports Stale.
    pub fn status_at(&self, now: DateTime<Utc>) -> EntryStatus {
        match self.status {
            EntryStatus::Fresh if self.is_expired_at(now) => EntryStatus::Stale,
            status => status,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            Some(fetched_at) => {
                let age = now
                    .signed_duration_since(fetched_at)
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                age >= self.stale_time
            }
            None => true,
        }
    }

    pub fn mounts(&self) -> usize {
        self.mounts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_status(&mut self, status: EntryStatus) {
        self.status = status;
    }

    pub(crate) fn store(&mut self, payload: Arc<Value>, now: DateTime<Utc>) {
        self.payload = Some(payload);
        self.fetched_at = Some(now);
        self.last_error = None;
        self.status = EntryStatus::Fresh;
    }
}

/// Result of a cache read, carrying freshness metadata.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    value: T,
    fetched_at: DateTime<Utc>,
    is_stale: bool,
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// A payload served from the cache.
    pub fn from_cache(value: T, fetched_at: DateTime<Utc>, is_stale: bool) -> Self {
        Self {
            value,
            fetched_at,
            is_stale,
            was_cache_hit: true,
        }
    }

    /// A payload that had to be fetched before it could be returned.
    pub fn from_network(value: T) -> Self {
        Self {
            value,
            fetched_at: Utc::now(),
            is_stale: false,
            was_cache_hit: false,
        }
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Whether the payload was served while a background refresh runs.
    pub fn is_stale(&self) -> bool {
        self.is_stale
    }

    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// How long ago the payload was fetched.
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            fetched_at: self.fetched_at,
            is_stale: self.is_stale,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl CacheRead<Arc<Value>> {
    /// Decode the shared payload into a typed snapshot.
    pub fn decode<T: DeserializeOwned>(self) -> Result<CacheRead<T>, SyncError> {
        let value = T::deserialize(self.value.as_ref())?;
        Ok(CacheRead {
            value,
            fetched_at: self.fetched_at,
            is_stale: self.is_stale,
            was_cache_hit: self.was_cache_hit,
        })
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{CacheKey, Resource};
    use serde_json::json;

    fn entry(stale_secs: u64) -> CacheEntry {
        CacheEntry::new(
            CacheKey::bare(Resource::InputStats),
            Duration::from_secs(stale_secs),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_entry_is_stale() {
        let entry = entry(30);
        assert_eq!(entry.status_at(Utc::now()), EntryStatus::Stale);
        assert!(entry.payload.is_none());
    }

    #[test]
    fn test_fresh_entry_expires() {
        let mut entry = entry(30);
        let now = Utc::now();
        entry.store(Arc::new(json!({"total": 1})), now);
        assert_eq!(entry.status_at(now), EntryStatus::Fresh);
        assert_eq!(
            entry.status_at(now + chrono::Duration::seconds(29)),
            EntryStatus::Fresh
        );
        assert_eq!(
            entry.status_at(now + chrono::Duration::seconds(30)),
            EntryStatus::Stale
        );
    }

    #[test]
    fn test_fetching_status_is_not_aged() {
        let mut entry = entry(0);
        entry.set_status(EntryStatus::Fetching);
        assert_eq!(entry.status_at(Utc::now()), EntryStatus::Fetching);
    }

    #[test]
    fn test_decode_keeps_metadata() {
        let fetched_at = Utc::now();
        let read = CacheRead::from_cache(Arc::new(json!([1, 2, 3])), fetched_at, true);
        let decoded: CacheRead<Vec<u32>> = read.decode().unwrap();
        assert!(decoded.is_stale());
        assert!(decoded.was_cache_hit());
        assert_eq!(decoded.fetched_at(), fetched_at);
        assert_eq!(decoded.into_value(), vec![1, 2, 3]);
    }

    #[test]
    fn test_decode_mismatch_is_decode_error() {
        let read = CacheRead::from_network(Arc::new(json!({"a": 1})));
        let err = read.decode::<Vec<u32>>().unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
    }
}
