//! Watermarks over the invalidation history.
//!
//! Each applied invalidation advances the watermark by one. A view that
//! remembers the watermark it rendered at can later ask whether anything it
//! depends on was invalidated since.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point in the invalidation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Watermark {
    /// Monotonically increasing sequence number.
    pub sequence: u64,
    /// When this watermark was observed.
    pub observed_at: DateTime<Utc>,
}

impl Watermark {
    pub fn new(sequence: u64) -> Self {
        Self {
            sequence,
            observed_at: Utc::now(),
        }
    }

    /// The watermark before any invalidation happened.
    pub fn zero() -> Self {
        Self {
            sequence: 0,
            observed_at: DateTime::UNIX_EPOCH,
        }
    }

    pub fn is_newer_than(&self, other: &Watermark) -> bool {
        self.sequence > other.sequence
    }

    pub fn is_at_least(&self, other: &Watermark) -> bool {
        self.sequence >= other.sequence
    }

    /// Number of invalidations between two watermarks.
    pub fn gap(&self, other: &Watermark) -> u64 {
        self.sequence.abs_diff(other.sequence)
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::zero()
    }
}
