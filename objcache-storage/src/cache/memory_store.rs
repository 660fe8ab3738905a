//! In-memory object store.
//!
//! Clones share the same objects, so one store can back several backends the
//! way one bucket backs several caches.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use objcache_core::{StoreError, StoreResult};

use super::traits::ObjectStore;

/// Object store keeping every object in a shared ordered map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl InMemoryObjectStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get count of stored objects.
    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored paths in order.
    pub fn paths(&self) -> Vec<String> {
        self.objects
            .read()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Clear all stored objects.
    pub fn clear(&self) -> StoreResult<()> {
        self.objects
            .write()
            .map_err(|_| StoreError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        let objects = self.objects.read().map_err(|_| StoreError::LockPoisoned)?;
        objects
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> StoreResult<()> {
        let mut objects = self.objects.write().map_err(|_| StoreError::LockPoisoned)?;
        objects.insert(path.to_string(), body);
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        let mut objects = self.objects.write().map_err(|_| StoreError::LockPoisoned)?;
        objects.remove(path);
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let objects = self.objects.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(objects
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(path, _)| path.starts_with(prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
