//! Cache configuration and counters.

use crate::key::Resource;
use std::collections::HashMap;
use std::time::Duration;

/// Configuration for the query cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Stale time applied to every resource without an override. `None`
    /// falls back to each resource's own default.
    pub default_stale_time: Option<Duration>,
    /// How long an unmounted entry may sit unread before GC evicts it.
    pub gc_time: Duration,
    /// Per-resource stale time overrides.
    pub stale_overrides: HashMap<Resource, Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_stale_time: None,
            gc_time: Duration::from_secs(300),
            stale_overrides: HashMap::new(),
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the stale time for every resource without an override.
    pub fn with_stale_time(mut self, duration: Duration) -> Self {
        self.default_stale_time = Some(duration);
        self
    }

    pub fn with_gc_time(mut self, duration: Duration) -> Self {
        self.gc_time = duration;
        self
    }

    pub fn with_stale_override(mut self, resource: Resource, duration: Duration) -> Self {
        self.stale_overrides.insert(resource, duration);
        self
    }

    /// Effective stale time for `resource`.
    pub fn stale_time_for(&self, resource: Resource) -> Duration {
        self.stale_overrides
            .get(&resource)
            .copied()
            .or(self.default_stale_time)
            .unwrap_or_else(|| resource.default_stale_time())
    }
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered with a fresh payload.
    pub hits: u64,
    /// Reads with no payload at all.
    pub misses: u64,
    /// Reads answered with a stale payload while a refresh ran.
    pub stale_serves: u64,
    /// Reads that joined a fetch already in flight.
    pub deduplicated: u64,
    /// Fetch completions dropped because a newer generation superseded them.
    pub discarded: u64,
    /// Entries evicted by garbage collection.
    pub evictions: u64,
    /// Entries currently held.
    pub entry_count: u64,
}

impl CacheStats {
    /// Share of reads served from cache, stale or not (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_serves;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 60,
            stale_serves: 20,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_stale_time_precedence() {
        let config = CacheConfig::new();
        assert_eq!(
            config.stale_time_for(Resource::ThemesList),
            Resource::ThemesList.default_stale_time()
        );

        let config = config
            .with_stale_time(Duration::from_secs(10))
            .with_stale_override(Resource::MyInputs, Duration::from_secs(2));
        assert_eq!(config.stale_time_for(Resource::ThemesList), Duration::from_secs(10));
        assert_eq!(config.stale_time_for(Resource::MyInputs), Duration::from_secs(2));
    }
}
