//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with age tracking.

use bytes::Bytes;

use crate::storage::{EntryRecord, SCHEMA_VERSION};

// == Cache Entry ==
/// Represents a single cached resource with its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Resource identifier
    pub key: String,
    /// Opaque payload
    pub payload: Bytes,
    /// Store timestamp (Unix milliseconds)
    pub stored_at: u64,
    /// Last store or read timestamp (Unix milliseconds)
    pub last_access: u64,
    /// Strategy whose bucket owns the entry
    pub strategy_name: String,
    /// Payload size in bytes
    pub size_bytes: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stored at `now_ms`.
    ///
    /// # Arguments
    /// * `key` - The resource identifier
    /// * `payload` - The payload to store
    /// * `strategy_name` - The owning strategy
    /// * `now_ms` - Current Unix timestamp in milliseconds
    pub fn new(key: String, payload: Bytes, strategy_name: String, now_ms: u64) -> Self {
        let size_bytes = payload.len() as u64;
        Self {
            key,
            payload,
            stored_at: now_ms,
            last_access: now_ms,
            strategy_name,
            size_bytes,
        }
    }

    // == Is Expired ==
    /// Checks if the entry is older than `max_age_ms` at `now_ms`.
    ///
    /// Boundary condition: an entry is expired once its age is greater than
    /// or equal to the max age, so a zero max age expires immediately.
    pub fn is_expired(&self, now_ms: u64, max_age_ms: u64) -> bool {
        self.age_ms(now_ms) >= max_age_ms
    }

    // == Age ==
    /// Milliseconds since the entry was stored.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.stored_at)
    }

    // == Touch ==
    /// Records a read at `now_ms`.
    pub fn touch(&mut self, now_ms: u64) {
        self.last_access = self.last_access.max(now_ms);
    }

    // == Persistence ==
    /// Metadata record mirrored into the persistent store.
    pub fn to_record(&self) -> EntryRecord {
        EntryRecord {
            schema_version: SCHEMA_VERSION,
            key: self.key.clone(),
            strategy_name: self.strategy_name.clone(),
            stored_at: self.stored_at,
            last_access: self.last_access,
            size_bytes: self.size_bytes,
        }
    }

    /// Rebuilds an entry from a mirrored record and its payload.
    pub fn from_record(record: EntryRecord, payload: Bytes) -> Self {
        Self {
            key: record.key,
            size_bytes: payload.len() as u64,
            payload,
            stored_at: record.stored_at,
            last_access: record.last_access,
            strategy_name: record.strategy_name,
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn entry(now: u64) -> CacheEntry {
        CacheEntry::new(
            "/a.js".to_string(),
            Bytes::from_static(b"hello"),
            "app-shell".to_string(),
            now,
        )
    }

    #[test]
    fn test_entry_creation() {
        let entry = entry(1_000);

        assert_eq!(entry.size_bytes, 5);
        assert_eq!(entry.stored_at, 1_000);
        assert_eq!(entry.last_access, 1_000);
    }

    #[test]
    fn test_entry_expiration() {
        let entry = entry(1_000);

        assert!(!entry.is_expired(1_500, 1_000));
        assert!(entry.is_expired(2_500, 1_000));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = entry(1_000);

        // Exactly max_age old counts as expired
        assert!(entry.is_expired(2_000, 1_000));
        assert!(entry.is_expired(1_000, 0));
    }

    #[test]
    fn test_age_saturates_on_clock_skew() {
        let entry = entry(1_000);
        assert_eq!(entry.age_ms(500), 0);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let mut entry = entry(1_000);
        entry.touch(2_000);
        entry.touch(1_500);
        assert_eq!(entry.last_access, 2_000);
        assert_eq!(entry.stored_at, 1_000);
    }

    #[test]
    fn test_record_roundtrip_keeps_metadata() {
        let mut original = entry(1_000);
        original.touch(3_000);

        let record = original.to_record();
        assert_eq!(record.schema_version, SCHEMA_VERSION);

        let rebuilt = CacheEntry::from_record(record, original.payload.clone());
        assert_eq!(rebuilt, original);
    }
}
