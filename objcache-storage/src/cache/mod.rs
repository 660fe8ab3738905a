//! Object-store cache backends.
//!
//! An [`ObjectStoreBackend`] persists cache entries as self-describing
//! records in an [`ObjectStore`], one object per key, under a configured key
//! prefix. Reads degrade to misses instead of failing; writes and deletions
//! propagate their errors.
//!
//! # Namespacing
//!
//! Several caches can share one bucket. Each backend owns the objects under
//! `<encoded prefix>/`, so flushing one cache never touches another, even
//! when one prefix is a string prefix of the other.
//!
//! # Example
//!
//! ```ignore
//! let store = InMemoryObjectStore::new();
//! let registry = PayloadRegistry::new().with_type::<String>("string")?;
//! let backend = ObjectStoreBackend::new(
//!     store,
//!     BackendConfig::new("pages", "shared", "frontend"),
//!     registry,
//!     Arc::new(NoopMetrics),
//! )?;
//!
//! backend.set("home", &Entry::new("<html>".to_string(), ttl, grace)).await?;
//! assert!(backend.get("home").await.is_some());
//! ```

pub mod lmdb_store;
pub mod memory_store;
pub mod metrics;
pub mod object_backend;
pub mod traits;

pub use lmdb_store::{LmdbEnvironment, LmdbObjectStore, LmdbStoreError, MAX_PATH_LEN};
pub use memory_store::InMemoryObjectStore;
pub use metrics::{
    BackendMetrics, CacheMetrics, MetricsError, DECODE_FAILED, ENCODE_FAILED, METRICS, SET_FAILED,
};
pub use object_backend::ObjectStoreBackend;
pub use traits::{CacheBackend, CacheStats, MetricsSink, NoopMetrics, ObjectStore};
