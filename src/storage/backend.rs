//! Persistence Backend
//!
//! The durable key/value capability the persistent store is built on.
//! Every operation is scoped to a namespace; namespaces are independent
//! partitions so writes to one never wait on another.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// == Backend Trait ==
/// Two-tier durable storage: a small-object tier for metadata records and a
/// blob tier for payloads.
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Stores a small record.
    async fn put_small(&self, ns: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    /// Reads a small record.
    async fn get_small(&self, ns: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Stores a blob.
    async fn put_blob(&self, ns: &str, key: &str, bytes: Bytes) -> Result<()>;

    /// Reads a blob.
    async fn get_blob(&self, ns: &str, key: &str) -> Result<Option<Bytes>>;

    /// Lists the keys present in either tier of a namespace, sorted.
    async fn list_keys(&self, ns: &str) -> Result<Vec<String>>;

    /// Removes a key from both tiers. Missing keys are not an error.
    async fn delete(&self, ns: &str, key: &str) -> Result<()>;

    /// Removes every key of a namespace.
    async fn delete_namespace(&self, ns: &str) -> Result<()>;
}
