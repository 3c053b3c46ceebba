//! File Backend
//!
//! Durable [`PersistenceBackend`] laid out on disk as
//! `<root>/<namespace>/{small,blob}/<hex(key)>`. Each namespace is its own
//! directory, so namespaces never contend with each other.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use crate::error::{CacheError, Result};
use crate::storage::PersistenceBackend;

const SMALL_DIR: &str = "small";
const BLOB_DIR: &str = "blob";
const TMP_SUFFIX: &str = ".tmp";

// == File Backend ==
/// Backend storing one file per key under a root directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    /// Creates a backend rooted at `root`. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, ns: &str) -> Result<PathBuf> {
        let valid = !ns.is_empty()
            && ns
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CacheError::Persistence(format!(
                "invalid namespace name: {:?}",
                ns
            )));
        }
        Ok(self.root.join(ns))
    }

    fn path_for(&self, ns: &str, tier: &str, key: &str) -> Result<PathBuf> {
        Ok(self.namespace_dir(ns)?.join(tier).join(encode_key(key)))
    }

    async fn write_file(&self, path: PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        // Write-then-rename so a crash never leaves a torn record behind
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_file(&self, path: PathBuf) -> Result<Option<Vec<u8>>> {
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_file(&self, path: PathBuf) -> Result<()> {
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn collect_keys(&self, dir: PathBuf, keys: &mut BTreeSet<String>) -> Result<()> {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            if let Some(key) = decode_key(name) {
                keys.insert(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PersistenceBackend for FileBackend {
    async fn put_small(&self, ns: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.path_for(ns, SMALL_DIR, key)?;
        self.write_file(path, &bytes).await
    }

    async fn get_small(&self, ns: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path_for(ns, SMALL_DIR, key)?;
        self.read_file(path).await
    }

    async fn put_blob(&self, ns: &str, key: &str, bytes: Bytes) -> Result<()> {
        let path = self.path_for(ns, BLOB_DIR, key)?;
        self.write_file(path, &bytes).await
    }

    async fn get_blob(&self, ns: &str, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(ns, BLOB_DIR, key)?;
        Ok(self.read_file(path).await?.map(Bytes::from))
    }

    async fn list_keys(&self, ns: &str) -> Result<Vec<String>> {
        let dir = self.namespace_dir(ns)?;
        let mut keys = BTreeSet::new();
        self.collect_keys(dir.join(SMALL_DIR), &mut keys).await?;
        self.collect_keys(dir.join(BLOB_DIR), &mut keys).await?;
        Ok(keys.into_iter().collect())
    }

    async fn delete(&self, ns: &str, key: &str) -> Result<()> {
        self.remove_file(self.path_for(ns, SMALL_DIR, key)?).await?;
        self.remove_file(self.path_for(ns, BLOB_DIR, key)?).await
    }

    async fn delete_namespace(&self, ns: &str) -> Result<()> {
        let dir = self.namespace_dir(ns)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// == Key Encoding ==
/// Hex-encodes a key so any resource identifier is a safe file name.
fn encode_key(key: &str) -> String {
    key.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn decode_key(name: &str) -> Option<String> {
    if name.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..name.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&name[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "resource_cache_{}_{}_{}",
            name,
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    #[test]
    fn test_key_encoding_roundtrip() {
        let key = "/static/app.js?v=2";
        assert_eq!(decode_key(&encode_key(key)).as_deref(), Some(key));
        assert!(decode_key("abc").is_none());
        assert!(decode_key("zz").is_none());
    }

    #[tokio::test]
    async fn test_file_backend_persists_across_instances() {
        let root = temp_root("persist");
        let backend = FileBackend::new(&root);

        backend.put_small("entries", "/a", b"{}".to_vec()).await.unwrap();
        backend
            .put_blob("entries", "/a", Bytes::from_static(b"payload"))
            .await
            .unwrap();

        let reopened = FileBackend::new(&root);
        assert_eq!(
            reopened.get_blob("entries", "/a").await.unwrap(),
            Some(Bytes::from_static(b"payload"))
        );
        assert_eq!(
            reopened.list_keys("entries").await.unwrap(),
            vec!["/a".to_string()]
        );

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_reads_and_deletes() {
        let root = temp_root("missing");
        let backend = FileBackend::new(&root);

        assert!(backend.get_small("entries", "nope").await.unwrap().is_none());
        assert!(backend.list_keys("entries").await.unwrap().is_empty());
        backend.delete("entries", "nope").await.unwrap();
        backend.delete_namespace("entries").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_namespace() {
        let root = temp_root("delete_ns");
        let backend = FileBackend::new(&root);

        backend.put_small("entries", "a", vec![1]).await.unwrap();
        backend.put_small("behavior", "h", vec![2]).await.unwrap();
        backend.delete_namespace("entries").await.unwrap();

        assert!(backend.list_keys("entries").await.unwrap().is_empty());
        assert_eq!(backend.get_small("behavior", "h").await.unwrap(), Some(vec![2]));

        fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_namespace_rejected() {
        let backend = FileBackend::new(temp_root("invalid"));
        let result = backend.put_small("../escape", "k", vec![]).await;
        assert!(matches!(result, Err(CacheError::Persistence(_))));
    }
}
