//! Cache backend persisting entries into an object store.
//!
//! Every operation is a stateless request/response cycle against the store;
//! the backend itself only holds immutable configuration. Concurrent calls
//! need no locking.

use std::sync::Arc;

use async_trait::async_trait;
use objcache_core::{
    BackendConfig, CacheError, CacheResult, Entry, EntryCodec, FlushPolicy, KeyNamespace,
    PayloadRegistry,
};

use super::metrics::{DECODE_FAILED, ENCODE_FAILED, SET_FAILED};
use super::traits::{CacheBackend, MetricsSink, ObjectStore};

const LOG_CATEGORY: &str = "objectStoreBackend";

/// [`CacheBackend`] over any [`ObjectStore`].
///
/// # Example
///
/// ```ignore
/// let registry = PayloadRegistry::new().with_type::<RenderedPage>("rendered-page")?;
/// let config = BackendConfig::new("pages", "shared-cache", "frontend");
/// let metrics = CacheMetrics::global(store.kind(), &config.cache_name)?;
/// let backend = ObjectStoreBackend::new(store, config, registry, Arc::new(metrics))?;
///
/// backend.set("home", &entry).await?;
/// let cached = backend.get("home").await;
/// ```
pub struct ObjectStoreBackend<S: ObjectStore> {
    store: S,
    config: BackendConfig,
    namespace: KeyNamespace,
    codec: EntryCodec,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: ObjectStore> ObjectStoreBackend<S> {
    /// Create a backend.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Config` if the configuration does not validate.
    pub fn new(
        store: S,
        config: BackendConfig,
        registry: PayloadRegistry,
        metrics: Arc<dyn MetricsSink>,
    ) -> CacheResult<Self> {
        config.validate()?;
        let namespace = config.namespace();
        tracing::debug!(
            category = LOG_CATEGORY,
            backend = store.kind(),
            cache = %config.cache_name,
            bucket = %config.bucket,
            prefix = %config.key_prefix,
            "Cache backend initialized"
        );
        Ok(Self {
            store,
            config,
            namespace,
            codec: EntryCodec::new(registry),
            metrics,
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Backend kind label of the underlying store.
    pub fn kind(&self) -> &'static str {
        self.store.kind()
    }

    /// Abort policy: the first failed delete ends the flush.
    async fn flush_abort(&self, paths: Vec<String>) -> CacheResult<u64> {
        let mut deleted = 0u64;
        for path in paths {
            match self.store.delete(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => deleted += 1,
                Err(e) => {
                    tracing::error!(
                        category = LOG_CATEGORY,
                        cache = %self.config.cache_name,
                        path = %path,
                        deleted,
                        error = %e,
                        "Flush aborted: failed to delete object"
                    );
                    return Err(e.into());
                }
            }
        }
        Ok(deleted)
    }

    /// Continue policy: attempt every delete, report failures together.
    async fn flush_continue(&self, paths: Vec<String>) -> CacheResult<u64> {
        let mut deleted = 0u64;
        let mut failed = Vec::new();
        for path in paths {
            match self.store.delete(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.is_not_found() => deleted += 1,
                Err(e) => {
                    tracing::warn!(
                        category = LOG_CATEGORY,
                        cache = %self.config.cache_name,
                        path = %path,
                        error = %e,
                        "Failed to delete object during flush, continuing"
                    );
                    failed.push((path, e));
                }
            }
        }

        if failed.is_empty() {
            Ok(deleted)
        } else {
            tracing::error!(
                category = LOG_CATEGORY,
                cache = %self.config.cache_name,
                deleted,
                failed = failed.len(),
                "Flush incomplete"
            );
            Err(CacheError::PartialFlush { deleted, failed })
        }
    }
}

#[async_trait]
impl<S: ObjectStore> CacheBackend for ObjectStoreBackend<S> {
    async fn get(&self, key: &str) -> Option<Entry> {
        let path = self.namespace.path(key);

        let body = match self.store.get(path.as_str()).await {
            Ok(body) => body,
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    key,
                    "Cache miss"
                );
                self.metrics.count_miss();
                return None;
            }
            Err(e) => {
                self.metrics.count_error(e.label());
                tracing::error!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    key,
                    error = %e,
                    "Failed to fetch object, treating as miss"
                );
                return None;
            }
        };

        match self.codec.decode(&body) {
            Ok(entry) => {
                self.metrics.count_hit();
                Some(entry)
            }
            Err(e) => {
                self.metrics.count_error(DECODE_FAILED);
                tracing::error!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    key,
                    error = %e,
                    "Error decoding content of key"
                );
                None
            }
        }
    }

    async fn set(&self, key: &str, entry: &Entry) -> CacheResult<()> {
        let body = match self.codec.encode(entry) {
            Ok(body) => body,
            Err(e) => {
                self.metrics.count_error(ENCODE_FAILED);
                tracing::error!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    key,
                    payload_type = entry.data.type_name(),
                    error = %e,
                    "Error encoding entry"
                );
                return Err(e.into());
            }
        };

        let path = self.namespace.path(key);
        let size = body.len();
        if let Err(e) = self.store.put(path.as_str(), body).await {
            self.metrics.count_error(SET_FAILED);
            tracing::error!(
                category = LOG_CATEGORY,
                cache = %self.config.cache_name,
                key,
                size,
                gracetime_secs = entry.meta.gracetime.as_secs(),
                error = %e,
                "Error setting key"
            );
            return Err(e.into());
        }

        Ok(())
    }

    async fn purge(&self, key: &str) -> CacheResult<()> {
        let path = self.namespace.path(key);
        match self.store.delete(path.as_str()).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => {
                tracing::error!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    key,
                    error = %e,
                    "Failed purge"
                );
                Err(e.into())
            }
        }
    }

    async fn flush(&self) -> CacheResult<u64> {
        let prefix = self.namespace.list_prefix();
        let paths = match self.store.list_by_prefix(&prefix).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::error!(
                    category = LOG_CATEGORY,
                    cache = %self.config.cache_name,
                    prefix = %prefix,
                    error = %e,
                    "Failed list for flush"
                );
                return Err(e.into());
            }
        };

        let listed = paths.len();
        let deleted = match self.config.flush_policy {
            FlushPolicy::AbortOnFirstError => self.flush_abort(paths).await?,
            FlushPolicy::ContinueOnError => self.flush_continue(paths).await?,
        };

        tracing::info!(
            category = LOG_CATEGORY,
            cache = %self.config.cache_name,
            prefix = %prefix,
            listed,
            deleted,
            "Flushed cache"
        );
        Ok(deleted)
    }
}
