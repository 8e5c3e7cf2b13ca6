//! Counters describing how well the cache is doing.

use serde::Serialize;

/// A point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Requests served from a cached interval.
    pub hits: u64,
    /// Requests that found no cached interval.
    pub misses: u64,
    /// Reads issued to the upstream source.
    pub upstream_reads: u64,
    /// Misses that joined a read already in flight instead of issuing one.
    pub coalesced: u64,
    /// Upstream reads that failed.
    pub upstream_failures: u64,
    /// Intervals dropped because the cache was full.
    pub evictions: u64,
    /// Intervals dropped because a newer interval covered them or no viewport showed them.
    pub pruned: u64,
}

impl CacheStats {
    /// Fraction of requests served without waiting on the source, or `None` before any request.
    pub fn hit_ratio(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        (total > 0).then(|| self.hits as f64 / total as f64)
    }
}
