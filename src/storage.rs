//! Blob storage for uploaded files.
//!
//! A [`BlobStore`] accepts raw bytes and hands back a stable URL; the
//! persistence layer only ever records that URL. [`LocalBlobStore`] keeps
//! blobs in a directory and issues URLs under a configured prefix, which the
//! HTTP server exposes at `/blobs/{key}`.

use crate::config::{BookFormat, StorageConfig};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Storage key.
    pub key: String,
    /// Public URL of the blob.
    pub url: String,
    /// Number of bytes written.
    pub size: u64,
}

/// Trait for blob storage backends.
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh key derived from the original file name.
    fn upload(&self, file_name: &str, data: &[u8]) -> Result<StoredBlob>;

    /// Read a blob back by key.
    fn read(&self, key: &str) -> Result<Vec<u8>>;

    /// Map a URL issued by this store back to its key.
    fn key_from_url(&self, url: &str) -> Option<String>;

    /// Read a blob by the URL this store issued for it.
    fn read_url(&self, url: &str) -> Result<Vec<u8>> {
        let key = self
            .key_from_url(url)
            .ok_or_else(|| AppError::Storage(format!("URL not served by this store: {}", url)))?;
        self.read(&key)
    }
}

/// Filesystem-backed blob store.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    public_url: String,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, issuing URLs under `public_url`.
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        Ok(Self {
            root,
            public_url: public_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a store from configuration.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        Self::new(&config.dir, &config.public_url)
    }

    /// Directory holding the blobs.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path on disk for a key, rejecting anything that is not a flat name.
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        if !is_valid_key(key) {
            return Err(AppError::InvalidFormat(format!("Invalid blob key: {}", key)));
        }
        Ok(self.root.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

impl BlobStore for LocalBlobStore {
    fn upload(&self, file_name: &str, data: &[u8]) -> Result<StoredBlob> {
        let key = blob_key(file_name);
        let path = self.path_for(&key)?;

        std::fs::write(&path, data)
            .map_err(|e| AppError::Storage(format!("Failed to write blob {}: {}", key, e)))?;

        tracing::debug!(key = %key, size = data.len(), "Stored blob");

        Ok(StoredBlob {
            url: self.url_for(&key),
            key,
            size: data.len() as u64,
        })
    }

    fn read(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("Blob not found: {}", key)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(&self.public_url)?.strip_prefix('/')?;
        is_valid_key(key).then(|| key.to_string())
    }
}

/// Build a fresh key, keeping a recognised extension from the file name.
fn blob_key(file_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(BookFormat::from_extension)
        .map(|f| f.extension());

    match ext {
        Some(ext) => format!("{}.{}", id, ext),
        None => id.to_string(),
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/blobs/").unwrap();

        let blob = store.upload("Moby Dick.EPUB", b"call me ishmael").unwrap();
        assert!(blob.key.ends_with(".epub"));
        assert_eq!(blob.url, format!("/blobs/{}", blob.key));
        assert_eq!(blob.size, 15);

        assert_eq!(store.read_url(&blob.url).unwrap(), b"call me ishmael");
    }

    #[test]
    fn test_unknown_extension_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/blobs").unwrap();

        let blob = store.upload("notes.weird", b"x").unwrap();
        assert!(!blob.key.contains('.'));
    }

    #[test]
    fn test_foreign_urls_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/blobs").unwrap();

        assert_eq!(store.key_from_url("https://cdn.example.com/a.epub"), None);
        assert_eq!(store.key_from_url("/blobs/../secret"), None);
        assert!(store.read_url("https://cdn.example.com/a.epub").is_err());
    }

    #[test]
    fn test_missing_blob_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "/blobs").unwrap();

        assert!(matches!(
            store.read("0000.epub"),
            Err(AppError::NotFound(_))
        ));
    }
}
