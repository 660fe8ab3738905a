//! objcache Test Utilities
//!
//! Shared test infrastructure for the objcache workspace:
//! - Sample payload types and a registry that knows them
//! - Fault-injecting object store and recording metrics sink
//! - Proptest generators for keys, prefixes and entries
//! - Fixtures and assertions for backend scenarios

pub use objcache_core::{
    BackendConfig, CacheError, CacheResult, Entry, EntryCodec, FlushPolicy, KeyNamespace, Meta,
    Payload, PayloadRegistry, StoreError, StoreResult,
};
pub use objcache_storage::{
    CacheBackend, InMemoryObjectStore, MetricsSink, NoopMetrics, ObjectStore, ObjectStoreBackend,
};

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// SAMPLE PAYLOADS
// ============================================================================

/// A rendered page, the typical payload of a frontend cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedPage {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// A user session record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: u64,
    pub roles: Vec<String>,
    pub active: bool,
}

/// Registry knowing `String`, [`RenderedPage`] and [`Session`].
pub fn registry() -> PayloadRegistry {
    let built = PayloadRegistry::new()
        .with_type::<String>("string")
        .and_then(|r| r.with_type::<RenderedPage>("rendered-page"))
        .and_then(|r| r.with_type::<Session>("session"));
    match built {
        Ok(registry) => registry,
        Err(e) => panic!("sample registry registration failed: {e}"),
    }
}

// ============================================================================
// FAULT INJECTION
// ============================================================================

/// Operation of an [`ObjectStore`], used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    List,
}

/// Object store wrapping an [`InMemoryObjectStore`] that fails on demand.
///
/// Faults are keyed by operation and exact path (the path is ignored for
/// [`StoreOp::List`]). Injected faults are transport errors and persist
/// until [`FailingObjectStore::heal`] is called.
#[derive(Debug, Clone, Default)]
pub struct FailingObjectStore {
    inner: InMemoryObjectStore,
    faults: Arc<Mutex<HashSet<(StoreOp, String)>>>,
}

impl FailingObjectStore {
    pub fn new(inner: InMemoryObjectStore) -> Self {
        Self {
            inner,
            faults: Arc::default(),
        }
    }

    /// The wrapped store, bypassing fault injection.
    pub fn inner(&self) -> &InMemoryObjectStore {
        &self.inner
    }

    /// Make `op` on `path` fail from now on.
    pub fn fail(&self, op: StoreOp, path: impl Into<String>) {
        let path = match op {
            StoreOp::List => String::new(),
            _ => path.into(),
        };
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert((op, path));
    }

    /// Remove every injected fault.
    pub fn heal(&self) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    fn check(&self, op: StoreOp, path: &str) -> StoreResult<()> {
        let faults = self
            .faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if faults.contains(&(op, path.to_string())) {
            Err(StoreError::transport(format!("injected {op:?} failure for {path:?}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ObjectStore for FailingObjectStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        self.check(StoreOp::Get, path)?;
        self.inner.get(path).await
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> StoreResult<()> {
        self.check(StoreOp::Put, path)?;
        self.inner.put(path, body).await
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        self.check(StoreOp::Delete, path)?;
        self.inner.delete(path).await
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.check(StoreOp::List, "")?;
        self.inner.list_by_prefix(prefix).await
    }

    fn kind(&self) -> &'static str {
        "failing"
    }
}

// ============================================================================
// RECORDING METRICS
// ============================================================================

/// Counts recorded by [`RecordingMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordedCounts {
    pub hits: u64,
    pub misses: u64,
    pub errors: BTreeMap<String, u64>,
}

impl RecordedCounts {
    /// Errors recorded with `kind`.
    pub fn errors_of(&self, kind: &str) -> u64 {
        self.errors.get(kind).copied().unwrap_or(0)
    }

    /// Errors recorded across all kinds.
    pub fn total_errors(&self) -> u64 {
        self.errors.values().sum()
    }
}

/// Metrics sink that records every count in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingMetrics {
    counts: Arc<Mutex<RecordedCounts>>,
}

impl RecordingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn snapshot(&self) -> RecordedCounts {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, f: impl FnOnce(&mut RecordedCounts)) {
        let mut counts = self
            .counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut counts);
    }
}

impl MetricsSink for RecordingMetrics {
    fn count_hit(&self) {
        self.record(|c| c.hits += 1);
    }

    fn count_miss(&self) {
        self.record(|c| c.misses += 1);
    }

    fn count_error(&self, kind: &str) {
        self.record(|c| *c.errors.entry(kind.to_string()).or_insert(0) += 1);
    }
}

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-writer tracing subscriber, once per process.
///
/// Filtered by `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub mod generators {
    //! Proptest strategies for cache keys, prefixes and entries.

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Generate a duration with valid sub-second nanos.
    pub fn arb_duration() -> impl Strategy<Value = Duration> {
        (0u64..=u64::MAX, 0u32..1_000_000_000).prop_map(|(secs, nanos)| Duration::new(secs, nanos))
    }

    /// Generate a cache key, including path-unsafe characters.
    pub fn arb_key() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z0-9]{1,16}",
            "[a-z]{1,8}/[a-z]{1,8}",
            "[ -~]{0,24}",
            any::<String>(),
        ]
    }

    /// Generate a non-blank key prefix.
    pub fn arb_prefix() -> impl Strategy<Value = String> {
        prop_oneof!["[a-z][a-z0-9-]{0,11}", "[a-z]{1,6}/[a-z]{1,6}", "[a-z]{1,4} [%&?]{1,3}",]
    }

    /// Generate a [`RenderedPage`].
    pub fn arb_rendered_page() -> impl Strategy<Value = RenderedPage> {
        (
            100u16..600,
            prop::collection::btree_map("[a-z-]{1,12}", "[ -~]{0,24}", 0..4),
            any::<String>(),
        )
            .prop_map(|(status, headers, body)| RenderedPage {
                status,
                headers,
                body,
            })
    }

    /// Generate a [`Session`].
    pub fn arb_session() -> impl Strategy<Value = Session> {
        (any::<u64>(), prop::collection::vec("[a-z]{1,8}", 0..4), any::<bool>()).prop_map(
            |(user_id, roles, active)| Session {
                user_id,
                roles,
                active,
            },
        )
    }

    /// Generate an entry holding one of the sample payloads, with tags.
    pub fn arb_entry() -> impl Strategy<Value = Entry> {
        let payload = prop_oneof![
            any::<String>().prop_map(Payload::new),
            arb_rendered_page().prop_map(Payload::new),
            arb_session().prop_map(Payload::new),
        ];
        (
            payload,
            arb_duration(),
            arb_duration(),
            prop::collection::btree_set("[a-z]{1,8}", 0..3),
        )
            .prop_map(|(data, lifetime, gracetime, tags)| {
                let mut meta = Meta::new(lifetime, gracetime);
                meta.tags = tags;
                Entry::with_meta(data, meta)
            })
    }
}

pub mod fixtures {
    //! Pre-built backends and entries for common scenarios.

    use super::*;
    use std::time::Duration;

    /// A home page entry with a one minute lifetime.
    pub fn home_page() -> Entry {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/html".to_string());
        Entry::new(
            RenderedPage {
                status: 200,
                headers,
                body: "<html><body>home</body></html>".to_string(),
            },
            Duration::from_secs(60),
            Duration::from_secs(30),
        )
    }

    /// A session entry with a one hour lifetime and no grace.
    pub fn session(user_id: u64) -> Entry {
        Entry::new(
            Session {
                user_id,
                roles: vec!["reader".to_string()],
                active: true,
            },
            Duration::from_secs(3600),
            Duration::ZERO,
        )
    }

    /// Configuration for a cache named after its prefix in a shared bucket.
    pub fn config(prefix: &str) -> BackendConfig {
        BackendConfig::new(prefix, "shared-bucket", format!("{prefix}-cache"))
    }

    /// Backend over `store` with the sample registry and recording metrics.
    pub fn backend<S: ObjectStore>(
        store: S,
        config: BackendConfig,
    ) -> (ObjectStoreBackend<S>, RecordingMetrics) {
        let metrics = RecordingMetrics::new();
        match ObjectStoreBackend::new(store, config, registry(), Arc::new(metrics.clone())) {
            Ok(backend) => (backend, metrics),
            Err(e) => panic!("fixture backend creation failed: {e}"),
        }
    }
}

pub mod assertions {
    //! Custom assertion functions for cache results.

    use super::*;

    /// Assert that a CacheResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CacheResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a CacheResult is a store transport error.
    #[track_caller]
    pub fn assert_transport_error<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Store(StoreError::Transport { .. })) => {}
            other => panic!("Expected Transport store error, got: {:?}", other),
        }
    }

    /// Assert that a CacheResult is an encode error.
    #[track_caller]
    pub fn assert_encode_error<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Encode(_)) => {}
            other => panic!("Expected Encode error, got: {:?}", other),
        }
    }

    /// Assert that two entries carry the same payload and persisted metadata.
    #[track_caller]
    pub fn assert_same_entry<T>(actual: &Entry, expected: &Entry)
    where
        T: PartialEq + std::fmt::Debug + 'static,
    {
        assert_eq!(actual.meta, expected.meta.persisted(), "metadata differs");
        assert_eq!(
            actual.data::<T>(),
            expected.data::<T>(),
            "payload differs or has the wrong type"
        );
    }
}
