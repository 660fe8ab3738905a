//! LMDB-backed object store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to provide a persistent,
//! memory-mapped blob store. One [`LmdbEnvironment`] is a directory on disk;
//! each bucket is a named LMDB database inside it, so several buckets (and
//! all the caches sharing them) live in one environment.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The store uses:
//! - Read transactions for `get` and `list_by_prefix`
//! - One write transaction per `put` and `delete`
//!
//! # Path Length
//!
//! LMDB keys are at most [`MAX_PATH_LEN`] bytes. Storage paths are
//! percent-encoded, so a key can take up to three times its UTF-8 length;
//! a key of 170 `/` characters under a short prefix already exceeds the
//! limit. Writes of longer paths fail with [`LmdbStoreError::PathTooLong`].

use std::path::Path;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use objcache_core::{StoreError, StoreResult};

use super::traits::ObjectStore;

/// Longest object path LMDB accepts as a key (default `MDB_MAXKEYSIZE`).
pub const MAX_PATH_LEN: usize = 511;

/// Error type for LMDB store setup and operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStoreError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database {bucket}: {reason}")]
    DbOpen { bucket: String, reason: String },

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Object path longer than LMDB's key size limit.
    #[error("Object path of {len} bytes exceeds the LMDB key limit of {max} bytes")]
    PathTooLong { len: usize, max: usize },

    /// Stored key is not valid UTF-8.
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convert LmdbStoreError to StoreError.
impl From<LmdbStoreError> for StoreError {
    fn from(e: LmdbStoreError) -> Self {
        StoreError::Transport {
            reason: e.to_string(),
        }
    }
}

fn txn_error(e: heed::Error) -> LmdbStoreError {
    LmdbStoreError::Transaction(e.to_string())
}

fn check_path_len(path: &str) -> Result<(), LmdbStoreError> {
    if path.len() > MAX_PATH_LEN {
        return Err(LmdbStoreError::PathTooLong {
            len: path.len(),
            max: MAX_PATH_LEN,
        });
    }
    Ok(())
}

/// An LMDB environment holding one database per bucket.
#[derive(Clone)]
pub struct LmdbEnvironment {
    env: Env,
}

impl LmdbEnvironment {
    /// Open (or create) an environment.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the environment in megabytes
    /// * `max_buckets` - Maximum number of buckets the environment can hold
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - LMDB environment cannot be opened
    pub fn open<P: AsRef<Path>>(
        path: P,
        max_size_mb: usize,
        max_buckets: u32,
    ) -> Result<Self, LmdbStoreError> {
        // Ensure directory exists
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per directory by this
        // process and its memory map is never mutated outside heed.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(max_buckets)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbStoreError::EnvOpen(e.to_string()))?;

        Ok(Self { env })
    }

    /// Open (or create) the store for `bucket`.
    pub fn bucket(&self, bucket: &str) -> Result<LmdbObjectStore, LmdbStoreError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        let db: Database<Bytes, Bytes> = self
            .env
            .create_database(&mut wtxn, Some(bucket))
            .map_err(|e| LmdbStoreError::DbOpen {
                bucket: bucket.to_string(),
                reason: e.to_string(),
            })?;

        wtxn.commit().map_err(txn_error)?;

        Ok(LmdbObjectStore {
            env: self.env.clone(),
            db,
            bucket: bucket.to_string(),
        })
    }
}

/// Object store over one named LMDB database.
///
/// # Example
///
/// ```ignore
/// use objcache_storage::cache::LmdbEnvironment;
///
/// let env = LmdbEnvironment::open("/var/cache/objcache", 1024, 8)?;
/// let store = env.bucket("frontend-cache")?;
/// ```
#[derive(Clone)]
pub struct LmdbObjectStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    bucket: String,
}

impl LmdbObjectStore {
    /// Open an environment at `path` and the store for `bucket` inside it.
    pub fn open<P: AsRef<Path>>(
        path: P,
        bucket: &str,
        max_size_mb: usize,
    ) -> Result<Self, LmdbStoreError> {
        LmdbEnvironment::open(path, max_size_mb, 1)?.bucket(bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Collect the keys starting with `prefix`.
    ///
    /// Seeks to the prefix, so the cost follows the namespace size rather
    /// than the bucket size.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> Result<Vec<String>, LmdbStoreError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;

        let mut keys = Vec::new();
        let iter = self.db.prefix_iter(&rtxn, prefix).map_err(txn_error)?;

        for result in iter {
            let (key, _) = result.map_err(txn_error)?;
            let path =
                std::str::from_utf8(key).map_err(|e| LmdbStoreError::InvalidPath(e.to_string()))?;
            keys.push(path.to_string());
        }

        Ok(keys)
    }
}

#[async_trait]
impl ObjectStore for LmdbObjectStore {
    async fn get(&self, path: &str) -> StoreResult<Vec<u8>> {
        // Such a path can never have been written.
        if path.len() > MAX_PATH_LEN {
            return Err(StoreError::NotFound {
                path: path.to_string(),
            });
        }

        let rtxn = self.env.read_txn().map_err(txn_error)?;

        match self.db.get(&rtxn, path.as_bytes()) {
            Ok(Some(bytes)) => Ok(bytes.to_vec()),
            Ok(None) => Err(StoreError::NotFound {
                path: path.to_string(),
            }),
            Err(e) => Err(txn_error(e).into()),
        }
    }

    async fn put(&self, path: &str, body: Vec<u8>) -> StoreResult<()> {
        check_path_len(path)?;

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        self.db
            .put(&mut wtxn, path.as_bytes(), &body)
            .map_err(txn_error)?;

        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> StoreResult<()> {
        if path.len() > MAX_PATH_LEN {
            return Ok(());
        }

        let mut wtxn = self.env.write_txn().map_err(txn_error)?;

        // `false` means the object was already absent, which is fine.
        self.db
            .delete(&mut wtxn, path.as_bytes())
            .map_err(txn_error)?;

        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    async fn list_by_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self.collect_keys_with_prefix(prefix.as_bytes())?)
    }

    fn kind(&self) -> &'static str {
        "lmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbObjectStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbObjectStore::open(temp_dir.path(), "test-bucket", 10)
            .expect("store creation should succeed");
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (store, _temp_dir) = create_test_store();
        store
            .put("pages/home", b"<html>".to_vec())
            .await
            .expect("put should succeed");
        let body = store.get("pages/home").await.expect("get should succeed");
        assert_eq!(body, b"<html>");
        assert_eq!(store.bucket(), "test-bucket");
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (store, _temp_dir) = create_test_store();
        let err = store.get("pages/none").await.expect_err("get should fail");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_and_idempotent_delete() {
        let (store, _temp_dir) = create_test_store();
        store.put("k", vec![1, 2]).await.expect("put should succeed");
        store.delete("k").await.expect("delete should succeed");
        assert!(store.get("k").await.is_err());
        store.delete("k").await.expect("deleting again should succeed");
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (store, _temp_dir) = create_test_store();
        for path in ["a/1", "a/2", "ab/1", "b/1"] {
            store.put(path, vec![0]).await.expect("put should succeed");
        }
        let mut listed = store.list_by_prefix("a/").await.expect("list should succeed");
        listed.sort();
        assert_eq!(listed, vec!["a/1".to_string(), "a/2".to_string()]);
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let env = LmdbEnvironment::open(temp_dir.path(), 10, 4).expect("env should open");
        let first = env.bucket("first").expect("bucket should open");
        let second = env.bucket("second").expect("bucket should open");

        first.put("p/k", vec![1]).await.expect("put should succeed");

        assert!(second.get("p/k").await.is_err());
        assert!(second
            .list_by_prefix("p/")
            .await
            .expect("list should succeed")
            .is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbObjectStore::open(temp_dir.path(), "persist", 10)
                .expect("store creation should succeed");
            store
                .put("p/survivor", vec![9, 9])
                .await
                .expect("put should succeed");
        }

        let reopened = LmdbObjectStore::open(temp_dir.path(), "persist", 10)
            .expect("reopen should succeed");
        assert_eq!(
            reopened.get("p/survivor").await.expect("get should succeed"),
            vec![9, 9]
        );
    }

    #[tokio::test]
    async fn test_path_length_limit() {
        let (store, _temp_dir) = create_test_store();
        let longest = "p".repeat(MAX_PATH_LEN);
        let too_long = "p".repeat(MAX_PATH_LEN + 1);

        store
            .put(&longest, vec![1])
            .await
            .expect("put at the limit should succeed");
        assert_eq!(store.get(&longest).await.expect("get should succeed"), vec![1]);

        let err = store.put(&too_long, vec![1]).await.expect_err("put should fail");
        assert!(err.to_string().contains("exceeds the LMDB key limit"));
        assert!(store.get(&too_long).await.expect_err("get should miss").is_not_found());
        store
            .delete(&too_long)
            .await
            .expect("deleting an unwritable path should succeed");
    }

    #[tokio::test]
    async fn test_list_by_prefix_skips_neighbours() {
        let (store, _temp_dir) = create_test_store();
        for path in ["a", "a.", "a/", "a/x", "a0", "b/x", "Z/x"] {
            store.put(path, vec![0]).await.expect("put should succeed");
        }
        let listed = store.list_by_prefix("a/").await.expect("list should succeed");
        assert_eq!(listed, vec!["a/".to_string(), "a/x".to_string()]);
    }

    #[test]
    fn test_error_converts_to_transport() {
        let err: StoreError = LmdbStoreError::Transaction("MDB_MAP_FULL".to_string()).into();
        assert_eq!(err.label(), "Transport");
        assert!(err.to_string().contains("MDB_MAP_FULL"));
    }
}
