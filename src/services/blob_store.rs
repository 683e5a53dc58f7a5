//! src/services/blob_store.rs
//!
//! Payload storage behind the `BlobStore` trait. `LocalBlobStore` keeps bytes
//! on disk sharded beneath `base_path/{shard}/{shard}/{key}`;
//! `MemoryBlobStore` keeps them in process and hands out `blob:` URLs, the
//! same lifetime a browser object URL has.

use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashMap,
    io::{self, Cursor, ErrorKind},
    path::{Path, PathBuf},
    pin::Pin,
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncWriteExt},
    sync::RwLock,
};
use tracing::debug;
use uuid::Uuid;

const MAX_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("invalid blob key `{0}`")]
    InvalidKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobError>;

pub type BlobReader = Pin<Box<dyn AsyncRead + Send>>;

/// What the store reports back after a successful `put`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    pub url: String,
    pub checksum: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any previous payload.
    async fn put(&self, key: &str, content_type: &str, bytes: Bytes) -> BlobResult<StoredBlob>;

    /// Open a payload for streaming out.
    async fn open(&self, key: &str) -> BlobResult<BlobReader>;

    /// Remove a payload. Missing keys are not an error.
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// Write then delete a scratch payload, for readiness checks.
    async fn probe(&self) -> BlobResult<()> {
        let key = format!("readyz-{}", Uuid::new_v4());
        self.put(&key, "text/plain", Bytes::from_static(b"readyz"))
            .await?;
        self.delete(&key).await
    }
}

/// Reject keys that could escape the store root.
fn ensure_key_safe(key: &str) -> BlobResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if invalid {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Disk-backed store.
#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Two-level shard directories from the MD5 of the key, to keep
    /// directory sizes bounded.
    fn shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn blob_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Remove empty directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    /// Writes to a temp file, fsyncs, then renames into place.
    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> BlobResult<StoredBlob> {
        ensure_key_safe(key)?;

        let file_path = self.blob_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobError::Io(io::Error::new(
                ErrorKind::Other,
                "blob path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok::<(), io::Error>(())
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BlobError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BlobError::Io(err));
            }
        }

        Ok(StoredBlob {
            url: format!("{}/{}", self.public_base_url, key),
            checksum: format!("{:x}", md5::compute(&bytes)),
            size: bytes.len() as u64,
        })
    }

    async fn open(&self, key: &str) -> BlobResult<BlobReader> {
        ensure_key_safe(key)?;
        let file = File::open(self.blob_path(key)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                BlobError::NotFound(key.to_string())
            } else {
                BlobError::Io(err)
            }
        })?;
        Ok(Box::pin(file))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.blob_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed blob {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("blob {} already missing", file_path.display());
            }
            Err(err) => return Err(BlobError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }
}

/// In-process store; payloads vanish with the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryBlobStore {
    origin: String,
    blobs: Arc<RwLock<HashMap<String, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            blobs: Arc::default(),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, _content_type: &str, bytes: Bytes) -> BlobResult<StoredBlob> {
        ensure_key_safe(key)?;
        let checksum = format!("{:x}", md5::compute(&bytes));
        let size = bytes.len() as u64;
        self.blobs.write().await.insert(key.to_string(), bytes);
        Ok(StoredBlob {
            url: format!("blob:{}/{}", self.origin, key),
            checksum,
            size,
        })
    }

    async fn open(&self, key: &str) -> BlobResult<BlobReader> {
        ensure_key_safe(key)?;
        let bytes = self
            .blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))?;
        Ok(Box::pin(Cursor::new(bytes)))
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        ensure_key_safe(key)?;
        self.blobs.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    async fn read_all(mut reader: BlobReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn local_put_open_delete() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost:3000/api/blobs/");

        let stored = store
            .put("p1/abc_report.pdf", "application/pdf", Bytes::from_static(b"%PDF-1.7"))
            .await
            .unwrap();
        assert_eq!(stored.url, "http://localhost:3000/api/blobs/p1/abc_report.pdf");
        assert_eq!(stored.size, 8);
        assert_eq!(stored.checksum, format!("{:x}", md5::compute(b"%PDF-1.7")));

        let bytes = read_all(store.open("p1/abc_report.pdf").await.unwrap()).await;
        assert_eq!(bytes, b"%PDF-1.7");

        store.delete("p1/abc_report.pdf").await.unwrap();
        assert!(matches!(
            store.open("p1/abc_report.pdf").await,
            Err(BlobError::NotFound(_))
        ));
        // shard directories are pruned back to the root
        let mut entries = fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn local_put_overwrites() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");
        store.put("k", "text/plain", Bytes::from_static(b"one")).await.unwrap();
        store.put("k", "text/plain", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(read_all(store.open("k").await.unwrap()).await, b"two");
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");
        for key in ["../etc/passwd", "/abs", "", "a\\b"] {
            assert!(matches!(
                store.put(key, "text/plain", Bytes::new()).await,
                Err(BlobError::InvalidKey(_))
            ));
        }
    }

    #[tokio::test]
    async fn deleting_a_missing_blob_is_ok() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://x");
        assert!(store.delete("never/written").await.is_ok());
    }

    #[tokio::test]
    async fn probe_leaves_nothing_behind() {
        let store = MemoryBlobStore::new("memory");
        store.probe().await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn memory_store_hands_out_blob_urls() {
        let store = MemoryBlobStore::new("memory/");
        let stored = store
            .put("p/site.jpg", "image/jpeg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        assert_eq!(stored.url, "blob:memory/p/site.jpg");
        assert_eq!(read_all(store.open("p/site.jpg").await.unwrap()).await, b"jpeg");
        store.delete("p/site.jpg").await.unwrap();
        assert_eq!(store.len().await, 0);
    }
}
