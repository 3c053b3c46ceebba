//! Persistent Store
//!
//! Typed, versioned records on top of a [`PersistenceBackend`]. Owns the
//! degraded-mode flag: the first backend failure switches the store to
//! in-memory-only operation for the rest of the session, and that switch is
//! logged once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::storage::PersistenceBackend;

// == Namespaces ==
/// Cached entry metadata (small tier) and payloads (blob tier).
pub const NS_ENTRIES: &str = "entries";
/// Behavior history.
pub const NS_BEHAVIOR: &str = "behavior";
/// Stats snapshots.
pub const NS_STATS: &str = "stats";

/// Version stamped on every record written by this build.
pub const SCHEMA_VERSION: u32 = 1;

// == Records ==
/// Persisted metadata of a cached entry. The payload lives in the blob tier
/// under the same key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub schema_version: u32,
    pub key: String,
    pub strategy_name: String,
    pub stored_at: u64,
    pub last_access: u64,
    pub size_bytes: u64,
}

/// Wrapper stamping a schema version on arbitrary records.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    schema_version: u32,
    data: T,
}

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: Option<u32>,
}

/// Decodes a versioned JSON record, returning `None` for records written
/// with a different schema version.
fn decode_versioned<T: DeserializeOwned>(bytes: &[u8]) -> Result<Option<T>> {
    let header: VersionHeader = serde_json::from_slice(bytes)?;
    if header.schema_version != Some(SCHEMA_VERSION) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(bytes)?))
}

// == Persistent Store ==
/// Cheaply cloneable handle shared by the engine, the recorder and the
/// stats snapshot task.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn PersistenceBackend>,
    degraded: Arc<AtomicBool>,
}

impl std::fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStore")
            .field("degraded", &self.is_degraded())
            .finish()
    }
}

impl PersistentStore {
    /// Creates a store over the given backend.
    pub fn new(backend: Arc<dyn PersistenceBackend>) -> Self {
        Self {
            backend,
            degraded: Arc::new(AtomicBool::new(false)),
        }
    }

    // == Degraded Mode ==
    /// Returns true once a backend failure has switched the store to
    /// in-memory-only operation.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }

    fn degrade(&self, err: &CacheError) {
        if !self.degraded.swap(true, Ordering::SeqCst) {
            warn!(
                "Persistence degraded, continuing in memory only for this session: {}",
                err
            );
        }
    }

    /// Runs a write unless degraded; failures flip the degraded flag.
    async fn guarded<F>(&self, op: F) -> bool
    where
        F: std::future::Future<Output = Result<()>>,
    {
        if self.is_degraded() {
            return false;
        }
        match op.await {
            Ok(()) => true,
            Err(e) => {
                self.degrade(&e);
                false
            }
        }
    }

    // == Entries ==
    /// Mirrors an entry: payload into the blob tier, then metadata into the
    /// small tier. Returns false if nothing was written.
    pub async fn save_entry(&self, record: &EntryRecord, payload: Bytes) -> bool {
        let key = record.key.clone();
        self.guarded(async {
            let meta = serde_json::to_vec(record)?;
            self.backend.put_blob(NS_ENTRIES, &key, payload).await?;
            self.backend.put_small(NS_ENTRIES, &key, meta).await
        })
        .await
    }

    /// Removes a mirrored entry.
    pub async fn remove_entry(&self, key: &str) -> bool {
        self.guarded(self.backend.delete(NS_ENTRIES, key)).await
    }

    /// Removes every mirrored entry. A no-op when degraded.
    pub async fn clear_entries(&self) -> bool {
        self.guarded(self.backend.delete_namespace(NS_ENTRIES)).await
    }

    /// Loads every compatible mirrored entry with its payload.
    ///
    /// Records with an unknown schema version, unreadable metadata or a
    /// missing payload are deleted and skipped.
    pub async fn load_entries(&self) -> Vec<(EntryRecord, Bytes)> {
        if self.is_degraded() {
            return Vec::new();
        }

        let keys = match self.backend.list_keys(NS_ENTRIES).await {
            Ok(keys) => keys,
            Err(e) => {
                self.degrade(&e);
                return Vec::new();
            }
        };

        let mut loaded = Vec::with_capacity(keys.len());
        for key in keys {
            match self.load_entry(&key).await {
                Ok(Some(pair)) => loaded.push(pair),
                Ok(None) => {
                    debug!("Discarding incompatible or orphaned entry record: {}", key);
                    self.remove_entry(&key).await;
                }
                Err(e) => {
                    self.degrade(&e);
                    break;
                }
            }
        }
        loaded
    }

    async fn load_entry(&self, key: &str) -> Result<Option<(EntryRecord, Bytes)>> {
        let Some(meta) = self.backend.get_small(NS_ENTRIES, key).await? else {
            return Ok(None);
        };
        let record = match decode_versioned::<EntryRecord>(&meta) {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(e) => {
                debug!("Unreadable entry record {}: {}", key, e);
                return Ok(None);
            }
        };
        let Some(payload) = self.backend.get_blob(NS_ENTRIES, key).await? else {
            return Ok(None);
        };
        Ok(Some((record, payload)))
    }

    // == Generic Records ==
    /// Saves a versioned record. Large records go to the blob tier.
    pub async fn save_record<T: Serialize + Sync>(
        &self,
        ns: &str,
        key: &str,
        value: &T,
        large: bool,
    ) -> bool {
        self.guarded(async {
            let bytes = serde_json::to_vec(&Envelope {
                schema_version: SCHEMA_VERSION,
                data: value,
            })?;
            if large {
                self.backend.put_blob(ns, key, Bytes::from(bytes)).await
            } else {
                self.backend.put_small(ns, key, bytes).await
            }
        })
        .await
    }

    /// Loads a versioned record, discarding it if incompatible.
    pub async fn load_record<T: DeserializeOwned>(
        &self,
        ns: &str,
        key: &str,
        large: bool,
    ) -> Option<T> {
        if self.is_degraded() {
            return None;
        }

        let read = if large {
            self.backend
                .get_blob(ns, key)
                .await
                .map(|b| b.map(|b| b.to_vec()))
        } else {
            self.backend.get_small(ns, key).await
        };

        let bytes = match read {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.degrade(&e);
                return None;
            }
        };

        if let Ok(Some(envelope)) = decode_versioned::<Envelope<T>>(&bytes) {
            return Some(envelope.data);
        }

        debug!("Discarding incompatible record {}/{}", ns, key);
        self.guarded(self.backend.delete(ns, key)).await;
        None
    }
}
