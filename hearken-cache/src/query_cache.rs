//! Keyed query cache.
//!
//! Holds one [`CacheEntry`] per [`CacheKey`] and routes reads by freshness:
//!
//! - fresh payload: returned straight from the cache;
//! - stale payload: returned immediately while a background refetch runs;
//! - no payload: the caller waits for a fetch.
//!
//! At most one fetch per key is in flight; concurrent readers join it. Every
//! fetch, write, and invalidation takes a new generation number, and a fetch
//! completion is applied only if its generation is still the entry's current
//! one. A response that lands after the key was invalidated or rewritten is
//! therefore dropped and the entry stays stale.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use hearken_core::{SyncError, SyncResult};
use serde_json::Value;

use crate::freshness::{CacheEntry, CacheRead, EntryStatus};
use crate::key::{CacheKey, KeyPattern};
use crate::stats::{CacheConfig, CacheStats};

type SharedFetch = Shared<BoxFuture<'static, SyncResult<Arc<Value>>>>;

/// Source of payloads for cache misses and refreshes.
///
/// Implemented by the client, which maps a key onto its endpoint.
#[async_trait]
pub trait QueryFetcher: Send + Sync {
    async fn fetch(&self, key: &CacheKey) -> SyncResult<Value>;
}

/// Proof that a fetch was started for a key at a given generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub key: CacheKey,
    pub generation: u64,
}

struct InFlight {
    generation: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_generation: u64,
    stats: CacheStats,
}

impl CacheState {
    fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn entry_mut(
        &mut self,
        config: &CacheConfig,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> &mut CacheEntry {
        self.entries.entry(key.clone()).or_insert_with(|| {
            CacheEntry::new(key.clone(), config.stale_time_for(key.resource()), now)
        })
    }

    /// Drop the in-flight marker only if it still belongs to `generation`.
    fn clear_in_flight(&mut self, key: &CacheKey, generation: u64) {
        if self
            .in_flight
            .get(key)
            .is_some_and(|in_flight| in_flight.generation == generation)
        {
            self.in_flight.remove(key);
        }
    }
}

struct CacheInner {
    state: Mutex<CacheState>,
    config: CacheConfig,
}

/// Process-local query cache. Cloning shares the same state.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Synchronous surface
    // ------------------------------------------------------------------------

    /// Peek at the cached payload without fetching.
    pub fn read(&self, key: &CacheKey) -> Option<CacheRead<Arc<Value>>> {
        self.read_at(key, Utc::now())
    }

    pub fn read_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheRead<Arc<Value>>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let served = state.entries.get_mut(key).and_then(|entry| {
            entry.last_accessed = now;
            let payload = entry.payload.clone()?;
            let is_stale = entry.status_at(now) != EntryStatus::Fresh;
            Some(CacheRead::from_cache(
                payload,
                entry.fetched_at.unwrap_or(now),
                is_stale,
            ))
        });
        match &served {
            Some(read) if read.is_stale() => state.stats.stale_serves += 1,
            Some(_) => state.stats.hits += 1,
            None => state.stats.misses += 1,
        }
        served
    }

    pub fn status(&self, key: &CacheKey) -> Option<EntryStatus> {
        self.status_at(key, Utc::now())
    }

    pub fn status_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<EntryStatus> {
        self.lock().entries.get(key).map(|entry| entry.status_at(now))
    }

    /// Snapshot of an entry, for inspection.
    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.lock().entries.get(key).cloned()
    }

    /// Store a payload directly, superseding any fetch in flight for the key.
    pub fn write(&self, key: &CacheKey, payload: Value) -> Arc<Value> {
        let now = Utc::now();
        let payload = Arc::new(payload);
        let mut guard = self.lock();
        let state = &mut *guard;
        let generation = state.next_generation();
        let entry = state.entry_mut(&self.inner.config, key, now);
        entry.generation = generation;
        entry.last_accessed = now;
        entry.store(Arc::clone(&payload), now);
        state.in_flight.remove(key);
        tracing::trace!(key = %key, generation, "cache write");
        payload
    }

    /// Mark every entry matched by any pattern as stale.
    ///
    /// Payloads are kept so views can keep showing them while they refetch.
    /// Fetches in flight for matched keys are superseded. Returns the number
    /// of entries marked.
    pub fn invalidate(&self, patterns: &[KeyPattern]) -> usize {
        let mut guard = self.lock();
        let state = &mut *guard;
        let matched: Vec<CacheKey> = state
            .entries
            .keys()
            .filter(|key| patterns.iter().any(|pattern| pattern.matches(key)))
            .cloned()
            .collect();

        for key in &matched {
            let generation = state.next_generation();
            if let Some(entry) = state.entries.get_mut(key) {
                entry.generation = generation;
                entry.set_status(EntryStatus::Stale);
            }
            state.in_flight.remove(key);
        }

        tracing::debug!(
            patterns = patterns.len(),
            invalidated = matched.len(),
            "cache invalidation"
        );
        matched.len()
    }

    /// Start a fetch for `key`, creating the entry if needed.
    pub fn begin_fetch(&self, key: &CacheKey) -> FetchTicket {
        let mut guard = self.lock();
        self.begin_fetch_locked(&mut guard, key, Utc::now())
    }

    fn begin_fetch_locked(
        &self,
        state: &mut CacheState,
        key: &CacheKey,
        now: DateTime<Utc>,
    ) -> FetchTicket {
        let generation = state.next_generation();
        let entry = state.entry_mut(&self.inner.config, key, now);
        entry.generation = generation;
        entry.last_accessed = now;
        entry.set_status(EntryStatus::Fetching);
        FetchTicket {
            key: key.clone(),
            generation,
        }
    }

    /// Apply a successful fetch. Returns false when the ticket was superseded
    /// and the payload was discarded.
    pub fn complete_fetch(&self, ticket: &FetchTicket, payload: Arc<Value>) -> bool {
        let now = Utc::now();
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clear_in_flight(&ticket.key, ticket.generation);

        match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.generation == ticket.generation => {
                entry.store(payload, now);
                tracing::trace!(key = %ticket.key, generation = ticket.generation, "fetch applied");
                true
            }
            _ => {
                state.stats.discarded += 1;
                tracing::debug!(
                    key = %ticket.key,
                    generation = ticket.generation,
                    "discarding superseded fetch response"
                );
                false
            }
        }
    }

    /// Record a failed fetch. The previous payload, if any, is kept.
    pub fn fail_fetch(&self, ticket: &FetchTicket, error: SyncError) -> bool {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.clear_in_flight(&ticket.key, ticket.generation);

        match state.entries.get_mut(&ticket.key) {
            Some(entry) if entry.generation == ticket.generation => {
                tracing::debug!(key = %ticket.key, error = %error, "fetch failed");
                entry.set_status(EntryStatus::Error);
                entry.last_error = Some(error);
                true
            }
            _ => {
                state.stats.discarded += 1;
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mounting and garbage collection
    // ------------------------------------------------------------------------

    /// Register a view that depends on `key`.
    pub fn mount(&self, key: &CacheKey) {
        let now = Utc::now();
        let mut guard = self.lock();
        let entry = guard.entry_mut(&self.inner.config, key, now);
        entry.mounts += 1;
        entry.last_accessed = now;
    }

    pub fn unmount(&self, key: &CacheKey) {
        let now = Utc::now();
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.mounts = entry.mounts.saturating_sub(1);
            entry.last_accessed = now;
        }
    }

    pub fn collect_garbage(&self) -> usize {
        self.collect_garbage_at(Utc::now())
    }

    /// Evict unmounted, idle entries whose last access is older than the
    /// configured GC time. Mounted entries and keys with a fetch in flight
    /// are never evicted.
    pub fn collect_garbage_at(&self, now: DateTime<Utc>) -> usize {
        let gc_time = self.inner.config.gc_time;
        let mut guard = self.lock();
        let state = &mut *guard;
        let in_flight = &state.in_flight;
        let before = state.entries.len();

        state.entries.retain(|key, entry| {
            if entry.mounts > 0 || in_flight.contains_key(key) {
                return true;
            }
            let idle = now
                .signed_duration_since(entry.last_accessed)
                .to_std()
                .unwrap_or_default();
            idle < gc_time
        });

        let evicted = before - state.entries.len();
        state.stats.evictions += evicted as u64;
        if evicted > 0 {
            tracing::debug!(evicted, remaining = state.entries.len(), "cache gc");
        }
        evicted
    }

    /// Drop every entry and in-flight fetch. Fetches still running will find
    /// their generation gone and be discarded.
    pub fn clear(&self) {
        let mut guard = self.lock();
        guard.entries.clear();
        guard.in_flight.clear();
    }

    // ------------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------------

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            entry_count: state.entries.len() as u64,
            ..state.stats.clone()
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    pub fn is_fetching(&self, key: &CacheKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    // ------------------------------------------------------------------------
    // Async reads
    // ------------------------------------------------------------------------

    /// Read `key` with stale-while-revalidate semantics.
    ///
    /// A fresh payload is returned as is. A stale payload is returned
    /// immediately, flagged stale, while a refetch runs in the background.
    /// With no payload the call waits for the fetch, joining one already in
    /// flight for the same key.
    pub async fn get<F>(&self, key: &CacheKey, fetcher: Arc<F>) -> SyncResult<CacheRead<Arc<Value>>>
    where
        F: QueryFetcher + ?Sized + 'static,
    {
        let now = Utc::now();
        let pending = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let cached = state.entries.get_mut(key).and_then(|entry| {
                entry.last_accessed = now;
                let payload = entry.payload.clone()?;
                Some((payload, entry.fetched_at.unwrap_or(now), entry.status_at(now)))
            });

            match cached {
                Some((payload, fetched_at, EntryStatus::Fresh)) => {
                    state.stats.hits += 1;
                    tracing::trace!(key = %key, "cache hit");
                    return Ok(CacheRead::from_cache(payload, fetched_at, false));
                }
                Some((payload, fetched_at, status)) => {
                    state.stats.stale_serves += 1;
                    tracing::debug!(key = %key, ?status, "serving stale payload, revalidating");
                    // The spawned driver completes the refresh on its own.
                    let _refresh = self.join_or_start(state, key, fetcher, now);
                    return Ok(CacheRead::from_cache(payload, fetched_at, true));
                }
                None => {
                    state.stats.misses += 1;
                    tracing::debug!(key = %key, "cache miss");
                    self.join_or_start(state, key, fetcher, now)
                }
            }
        };

        let payload = pending.await?;
        Ok(CacheRead::from_network(payload))
    }

    /// Fetch `key` regardless of freshness and wait for the result, joining
    /// a fetch already in flight.
    pub async fn refetch<F>(&self, key: &CacheKey, fetcher: Arc<F>) -> SyncResult<Arc<Value>>
    where
        F: QueryFetcher + ?Sized + 'static,
    {
        let pending = {
            let mut guard = self.lock();
            self.join_or_start(&mut guard, key, fetcher, Utc::now())
        };
        pending.await
    }

    fn join_or_start<F>(
        &self,
        state: &mut CacheState,
        key: &CacheKey,
        fetcher: Arc<F>,
        now: DateTime<Utc>,
    ) -> SharedFetch
    where
        F: QueryFetcher + ?Sized + 'static,
    {
        if let Some(in_flight) = state.in_flight.get(key) {
            state.stats.deduplicated += 1;
            tracing::debug!(key = %key, generation = in_flight.generation, "joining in-flight fetch");
            return in_flight.future.clone();
        }

        let ticket = self.begin_fetch_locked(state, key, now);
        let generation = ticket.generation;
        let cache = self.clone();
        let future: SharedFetch = async move {
            match fetcher.fetch(&ticket.key).await {
                Ok(value) => {
                    let payload = Arc::new(value);
                    cache.complete_fetch(&ticket, Arc::clone(&payload));
                    Ok(payload)
                }
                Err(err) => {
                    cache.fail_fetch(&ticket, err.clone());
                    Err(err)
                }
            }
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                generation,
                future: future.clone(),
            },
        );
        // Driven independently so the fetch settles even if every waiter
        // goes away; a superseded result is discarded by generation.
        tokio::spawn(future.clone());
        tracing::debug!(key = %key, generation, "fetch started");
        future
    }
}
