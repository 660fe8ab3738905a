//! Prometheus metrics for cache backends.
//!
//! Counters are partitioned by `backend` (the object store kind) and `cache`
//! (the owning cache's name); errors additionally carry a `kind` label.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec_with_registry, IntCounter, IntCounterVec, Registry};

use super::traits::{CacheStats, MetricsSink};

/// Error kind for a record that could not be decoded.
pub const DECODE_FAILED: &str = "DecodeFailed";
/// Error kind for an entry that could not be encoded.
pub const ENCODE_FAILED: &str = "EncodeFailed";
/// Error kind for a store write that failed.
pub const SET_FAILED: &str = "SetFailed";

/// Metrics registration failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to register {name}: {reason}")]
    Registration { name: &'static str, reason: String },
}

/// Global metrics registered with the default Prometheus registry.
pub static METRICS: Lazy<Result<BackendMetrics, MetricsError>> =
    Lazy::new(|| BackendMetrics::register(prometheus::default_registry()));

/// Counter families shared by every backend in one registry.
#[derive(Clone)]
pub struct BackendMetrics {
    /// Cache hits - labels: backend, cache
    pub hits_total: IntCounterVec,

    /// Cache misses - labels: backend, cache
    pub misses_total: IntCounterVec,

    /// Cache errors - labels: backend, cache, kind
    pub errors_total: IntCounterVec,
}

impl BackendMetrics {
    /// Create the counter families and register them with `registry`.
    pub fn register(registry: &Registry) -> Result<Self, MetricsError> {
        Ok(Self {
            hits_total: register_int_counter_vec_with_registry!(
                "objcache_backend_hits_total",
                "Total number of cache backend hits",
                &["backend", "cache"],
                registry
            )
            .map_err(|e| registration_error("objcache_backend_hits_total", e))?,

            misses_total: register_int_counter_vec_with_registry!(
                "objcache_backend_misses_total",
                "Total number of cache backend misses",
                &["backend", "cache"],
                registry
            )
            .map_err(|e| registration_error("objcache_backend_misses_total", e))?,

            errors_total: register_int_counter_vec_with_registry!(
                "objcache_backend_errors_total",
                "Total number of cache backend errors",
                &["backend", "cache", "kind"],
                registry
            )
            .map_err(|e| registration_error("objcache_backend_errors_total", e))?,
        })
    }
}

fn registration_error(name: &'static str, e: prometheus::Error) -> MetricsError {
    MetricsError::Registration {
        name,
        reason: e.to_string(),
    }
}

/// Metrics handle for one backend instance.
#[derive(Clone)]
pub struct CacheMetrics {
    metrics: BackendMetrics,
    backend_kind: String,
    cache_name: String,
    hits: IntCounter,
    misses: IntCounter,
    errors_seen: Arc<AtomicU64>,
}

impl CacheMetrics {
    /// Bind `metrics` to one `(backend_kind, cache_name)` partition.
    pub fn new(
        metrics: &BackendMetrics,
        backend_kind: impl Into<String>,
        cache_name: impl Into<String>,
    ) -> Self {
        let backend_kind = backend_kind.into();
        let cache_name = cache_name.into();
        let hits = metrics
            .hits_total
            .with_label_values(&[backend_kind.as_str(), cache_name.as_str()]);
        let misses = metrics
            .misses_total
            .with_label_values(&[backend_kind.as_str(), cache_name.as_str()]);
        Self {
            metrics: metrics.clone(),
            backend_kind,
            cache_name,
            hits,
            misses,
            errors_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Bind the global metrics to one partition.
    pub fn global(
        backend_kind: impl Into<String>,
        cache_name: impl Into<String>,
    ) -> Result<Self, MetricsError> {
        let metrics = METRICS.as_ref().map_err(Clone::clone)?;
        Ok(Self::new(metrics, backend_kind, cache_name))
    }

    pub fn backend_kind(&self) -> &str {
        &self.backend_kind
    }

    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Hits counted for this partition.
    pub fn hits(&self) -> u64 {
        self.hits.get()
    }

    /// Misses counted for this partition.
    pub fn misses(&self) -> u64 {
        self.misses.get()
    }

    /// Errors of `kind` counted for this partition.
    pub fn errors(&self, kind: &str) -> u64 {
        self.metrics
            .errors_total
            .with_label_values(&[self.backend_kind.as_str(), self.cache_name.as_str(), kind])
            .get()
    }

    /// Snapshot of this handle's counters.
    ///
    /// `errors` only counts errors reported through this handle and its
    /// clones.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits(),
            misses: self.misses(),
            errors: self.errors_seen.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSink for CacheMetrics {
    fn count_hit(&self) {
        self.hits.inc();
    }

    fn count_miss(&self) {
        self.misses.inc();
    }

    fn count_error(&self, kind: &str) {
        self.metrics
            .errors_total
            .with_label_values(&[self.backend_kind.as_str(), self.cache_name.as_str(), kind])
            .inc();
        self.errors_seen.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_metrics() -> BackendMetrics {
        BackendMetrics::register(&Registry::new()).expect("registration should succeed")
    }

    #[test]
    fn test_counts_are_partitioned() {
        let metrics = fresh_metrics();
        let pages = CacheMetrics::new(&metrics, "memory", "pages");
        let sessions = CacheMetrics::new(&metrics, "memory", "sessions");

        pages.count_hit();
        pages.count_hit();
        pages.count_miss();
        sessions.count_miss();

        assert_eq!(pages.hits(), 2);
        assert_eq!(pages.misses(), 1);
        assert_eq!(sessions.hits(), 0);
        assert_eq!(sessions.misses(), 1);
    }

    #[test]
    fn test_error_kinds() {
        let metrics = fresh_metrics();
        let handle = CacheMetrics::new(&metrics, "lmdb", "pages");

        handle.count_error(DECODE_FAILED);
        handle.count_error(DECODE_FAILED);
        handle.count_error(SET_FAILED);

        assert_eq!(handle.errors(DECODE_FAILED), 2);
        assert_eq!(handle.errors(SET_FAILED), 1);
        assert_eq!(handle.errors(ENCODE_FAILED), 0);
        assert_eq!(handle.stats().errors, 3);
    }

    #[test]
    fn test_stats_snapshot() {
        let metrics = fresh_metrics();
        let handle = CacheMetrics::new(&metrics, "memory", "pages");
        handle.count_hit();
        handle.count_hit();
        handle.count_hit();
        handle.count_miss();

        let stats = handle.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate() - 0.75).abs() < 0.001);
    }

    #[test]
    fn test_clones_share_counters() {
        let metrics = fresh_metrics();
        let handle = CacheMetrics::new(&metrics, "memory", "pages");
        let cloned = handle.clone();
        cloned.count_hit();
        cloned.count_error(ENCODE_FAILED);
        assert_eq!(handle.hits(), 1);
        assert_eq!(handle.stats().errors, 1);
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        BackendMetrics::register(&registry).expect("first registration should succeed");
        let err = BackendMetrics::register(&registry).err();
        assert!(matches!(
            err,
            Some(MetricsError::Registration {
                name: "objcache_backend_hits_total",
                ..
            })
        ));
    }

    #[test]
    fn test_global_metrics() -> Result<(), String> {
        let handle =
            CacheMetrics::global("memory", "global-test").map_err(|e| e.to_string())?;
        handle.count_hit();
        assert!(handle.hits() >= 1);
        assert_eq!(handle.backend_kind(), "memory");
        assert_eq!(handle.cache_name(), "global-test");
        Ok(())
    }
}
