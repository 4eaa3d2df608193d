//! Query cache and invalidation for the Hearken client.
//!
//! Fetched state is named by [`CacheKey`]s and held in a [`QueryCache`] that
//! makes staleness explicit: every read says whether it was fresh, and stale
//! payloads are served while a background refetch runs. Writes never touch
//! cached payloads directly. Instead, each successful mutation is handed to
//! the [`InvalidationCoordinator`], which marks dependent keys stale through
//! one auditable table.

pub mod freshness;
pub mod invalidation;
pub mod key;
pub mod query_cache;
pub mod stats;
pub mod watermark;

pub use freshness::{CacheEntry, CacheRead, EntryStatus};
pub use invalidation::{
    DirectoryKind, InvalidationCoordinator, InvalidationLog, InvalidationRecord, MutationKind,
};
pub use key::{key_for, CacheKey, KeyPattern, Resource, ResourceFamily, UnknownResource};
pub use query_cache::{FetchTicket, QueryCache, QueryFetcher};
pub use stats::{CacheConfig, CacheStats};
pub use watermark::Watermark;
