//! Backend, object store and metrics sink traits.
//!
//! The cache layer talks to a [`CacheBackend`]; a backend talks to an
//! [`ObjectStore`] and reports outcomes to a [`MetricsSink`]. Every seam is a
//! trait so stores and sinks can be swapped, and faked in tests.

use async_trait::async_trait;
use objcache_core::{CacheResult, Entry, StoreResult};

/// Blob store capability consumed by a backend.
///
/// Implementations must be safe for concurrent use and provide per-object
/// atomicity: a `put` or `delete` on one path never disturbs another path.
/// Timeouts, retries and cancellation are the implementation's business.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the object at `path`.
    ///
    /// Absent objects yield `StoreError::NotFound`.
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>>;

    /// Create or replace the object at `path`.
    async fn put(&self, path: &str, body: Vec<u8>) -> StoreResult<()>;

    /// Remove the object at `path`. Removing an absent object succeeds.
    async fn delete(&self, path: &str) -> StoreResult<()>;

    /// All object paths starting with `prefix`.
    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Backend kind label for metrics, e.g. `"memory"` or `"lmdb"`.
    fn kind(&self) -> &'static str;
}

/// Cache backend trait for pluggable cache implementations.
///
/// # Failure semantics
///
/// Reads never fail: a transport or decode problem is reported to metrics,
/// logged, and degrades to `None` so the cache layer keeps serving. Writes
/// return their errors, since a silently dropped write would hide stale data
/// behind what looks like an ordinary miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Get an entry, or `None` when absent or unreadable.
    ///
    /// A store failure other than `NotFound` is counted under the store
    /// error's category (`StoreError::label()`, e.g. `"Transport"`), not its
    /// full text, so the error label set stays bounded.
    async fn get(&self, key: &str) -> Option<Entry>;

    /// Store an entry. Metadata tags are not persisted.
    async fn set(&self, key: &str, entry: &Entry) -> CacheResult<()>;

    /// Remove one entry. Purging an absent key succeeds.
    async fn purge(&self, key: &str) -> CacheResult<()>;

    /// Remove every entry of this backend's namespace.
    ///
    /// Returns the number of objects deleted. Not atomic and not isolated
    /// from concurrent writers.
    async fn flush(&self) -> CacheResult<u64>;
}

/// Outcome counters a backend reports to.
///
/// Implementations must never block or fail the calling operation.
pub trait MetricsSink: Send + Sync {
    fn count_hit(&self);

    fn count_miss(&self);

    /// Count an error of category `kind`.
    fn count_error(&self, kind: &str);
}

/// Sink that discards every count.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn count_hit(&self) {}

    fn count_miss(&self) {}

    fn count_error(&self, _kind: &str) {}
}

/// Point-in-time view of a backend's counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of counted errors across all kinds.
    pub errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_noop_metrics_accepts_everything() {
        let sink: &dyn MetricsSink = &NoopMetrics;
        sink.count_hit();
        sink.count_miss();
        sink.count_error("DecodeFailed");
    }
}
