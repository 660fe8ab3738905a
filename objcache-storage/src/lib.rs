//! Object-store cache backend storage layer.
//!
//! Backends, object stores and metrics adapters on top of the record codec
//! and key namespacing in `objcache-core`.

pub mod cache;

pub use cache::{
    BackendMetrics, CacheBackend, CacheMetrics, CacheStats, InMemoryObjectStore, LmdbEnvironment,
    LmdbObjectStore, LmdbStoreError, MetricsError, MetricsSink, NoopMetrics, ObjectStore,
    ObjectStoreBackend, DECODE_FAILED, ENCODE_FAILED, SET_FAILED,
};
