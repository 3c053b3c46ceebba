//! In-Memory Backend
//!
//! Volatile [`PersistenceBackend`] used by tests and by deployments that do
//! not need state to survive a restart.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::error::{CacheError, Result};
use crate::storage::PersistenceBackend;

// == Partition ==
#[derive(Debug, Default)]
struct Partition {
    small: HashMap<String, Vec<u8>>,
    blobs: HashMap<String, Bytes>,
}

// == Memory Backend ==
/// Backend holding one independently locked partition per namespace.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    partitions: RwLock<HashMap<String, Arc<Mutex<Partition>>>>,
    fail_writes: AtomicBool,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with a persistence error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn partition(&self, ns: &str) -> Arc<Mutex<Partition>> {
        if let Some(partition) = self.partitions.read().get(ns) {
            return partition.clone();
        }
        self.partitions
            .write()
            .entry(ns.to_string())
            .or_default()
            .clone()
    }

    fn check_writable(&self, ns: &str, key: &str) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Persistence(format!(
                "write rejected for {}/{}",
                ns, key
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for MemoryBackend {
    async fn put_small(&self, ns: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.check_writable(ns, key)?;
        self.partition(ns).lock().small.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_small(&self, ns: &str, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.partition(ns).lock().small.get(key).cloned())
    }

    async fn put_blob(&self, ns: &str, key: &str, bytes: Bytes) -> Result<()> {
        self.check_writable(ns, key)?;
        self.partition(ns).lock().blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get_blob(&self, ns: &str, key: &str) -> Result<Option<Bytes>> {
        Ok(self.partition(ns).lock().blobs.get(key).cloned())
    }

    async fn list_keys(&self, ns: &str) -> Result<Vec<String>> {
        let partition = self.partition(ns);
        let guard = partition.lock();
        let keys: BTreeSet<String> = guard
            .small
            .keys()
            .chain(guard.blobs.keys())
            .cloned()
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn delete(&self, ns: &str, key: &str) -> Result<()> {
        self.check_writable(ns, key)?;
        let partition = self.partition(ns);
        let mut guard = partition.lock();
        guard.small.remove(key);
        guard.blobs.remove(key);
        Ok(())
    }

    async fn delete_namespace(&self, ns: &str) -> Result<()> {
        self.check_writable(ns, "*")?;
        let partition = self.partition(ns);
        let mut guard = partition.lock();
        guard.small.clear();
        guard.blobs.clear();
        Ok(())
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_small_and_blob_tiers() {
        let backend = MemoryBackend::new();

        backend.put_small("ns", "a", b"meta".to_vec()).await.unwrap();
        backend
            .put_blob("ns", "a", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        assert_eq!(backend.get_small("ns", "a").await.unwrap(), Some(b"meta".to_vec()));
        assert_eq!(
            backend.get_blob("ns", "a").await.unwrap(),
            Some(Bytes::from_static(b"payload"))
        );
        assert_eq!(backend.list_keys("ns").await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let backend = MemoryBackend::new();

        backend.put_small("one", "k", vec![1]).await.unwrap();
        backend.put_small("two", "k", vec![2]).await.unwrap();
        backend.delete_namespace("one").await.unwrap();

        assert!(backend.get_small("one", "k").await.unwrap().is_none());
        assert_eq!(backend.get_small("two", "k").await.unwrap(), Some(vec![2]));
    }

    #[tokio::test]
    async fn test_delete_removes_both_tiers() {
        let backend = MemoryBackend::new();

        backend.put_small("ns", "k", vec![1]).await.unwrap();
        backend.put_blob("ns", "k", Bytes::from_static(b"x")).await.unwrap();
        backend.delete("ns", "k").await.unwrap();

        assert!(backend.list_keys("ns").await.unwrap().is_empty());
        // Deleting again is fine
        backend.delete("ns", "k").await.unwrap();
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let backend = MemoryBackend::new();
        backend.set_fail_writes(true);

        let result = backend.put_small("ns", "k", vec![1]).await;
        assert!(matches!(result, Err(CacheError::Persistence(_))));

        backend.set_fail_writes(false);
        assert!(backend.put_small("ns", "k", vec![1]).await.is_ok());
    }
}
