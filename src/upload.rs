//! Upload flow: store the bytes, then record them.

use crate::config::BookFormat;
use crate::db::{Database, FileRecord, NewFile};
use crate::error::Result;
use crate::storage::BlobStore;
use serde::{Deserialize, Serialize};

/// MIME type recorded when nothing better is known.
pub const FALLBACK_MIME: &str = "application/octet-stream";

/// Metadata of a file that already sits in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Original file name.
    pub name: String,
    /// Declared MIME type.
    pub format: String,
    /// Size in bytes.
    pub size: u64,
    /// URL issued by the blob store.
    pub url: String,
}

/// Record an uploaded file. Failures are logged and returned.
pub fn persist_upload(db: &Database, file: &UploadedFile) -> Result<FileRecord> {
    let new_file = NewFile {
        name: file.name.clone(),
        format: file.format.clone(),
        size: file.size as i64,
        content_url: Some(file.url.clone()),
        content: None,
    };

    match db.create_file(&new_file) {
        Ok(record) => {
            tracing::info!(id = record.id, name = %record.name, "Recorded upload");
            Ok(record)
        }
        Err(e) => {
            tracing::error!(error = %e, name = %file.name, url = %file.url, "Failed to record upload");
            Err(e)
        }
    }
}

/// MIME type to record: the declared one, else one derived from the name.
pub fn declared_format(declared: Option<&str>, file_name: &str) -> String {
    match declared.map(str::trim).filter(|d| !d.is_empty()) {
        Some(declared) => declared.to_string(),
        None => BookFormat::detect("", file_name)
            .map(|f| f.mime_type().to_string())
            .unwrap_or_else(|| FALLBACK_MIME.to_string()),
    }
}

/// Upload bytes to the blob store and record the result.
pub fn upload_and_persist(
    blobs: &dyn BlobStore,
    db: &Database,
    name: &str,
    declared: Option<&str>,
    data: &[u8],
) -> Result<FileRecord> {
    let blob = blobs.upload(name, data)?;

    let file = UploadedFile {
        name: name.to_string(),
        format: declared_format(declared, name),
        size: blob.size,
        url: blob.url,
    };
    persist_upload(db, &file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_format_fallback() {
        assert_eq!(declared_format(Some("application/pdf"), "a.epub"), "application/pdf");
        assert_eq!(declared_format(Some(" "), "a.epub"), "application/epub+zip");
        assert_eq!(declared_format(None, "notes"), FALLBACK_MIME);
    }
}
