//! Application state shared across handlers.

use crate::config::{BookFormat, Config};
use crate::db::{Database, FileRecord};
use crate::error::{AppError, Result};
use crate::formats::ArchiveEngineFactory;
use crate::reader::BookSource;
use crate::storage::{BlobStore, LocalBlobStore};
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// Database connection.
    pub db: Database,
    /// Blob store holding uploaded bytes.
    pub blobs: Arc<LocalBlobStore>,
}

impl AppState {
    /// Create application state from its parts.
    pub fn new(config: Config, db: Database, blobs: LocalBlobStore) -> Self {
        Self {
            config: Arc::new(config),
            db,
            blobs: Arc::new(blobs),
        }
    }

    /// Look up a record, turning a missing row into `NotFound`.
    pub fn require_file(&self, id: i64) -> Result<FileRecord> {
        self.db
            .get_file(id)?
            .ok_or_else(|| AppError::NotFound(format!("File not found: {}", id)))
    }

    /// Where the reader should load a record from.
    pub fn book_source(&self, record: &FileRecord) -> Result<BookSource> {
        if let Some(url) = &record.content_url {
            return Ok(BookSource::Url(url.clone()));
        }
        if let Some(content) = &record.content {
            return Ok(BookSource::from(content.clone()));
        }
        Err(AppError::NotFound(format!("File {} has no content", record.id)))
    }

    /// Bytes of a record, from the blob store or the legacy inline column.
    pub fn book_bytes(&self, record: &FileRecord) -> Result<Vec<u8>> {
        match self.book_source(record)? {
            BookSource::Url(url) => self.blobs.read_url(&url),
            BookSource::Binary(data) => Ok(data.to_vec()),
        }
    }

    /// Detected format of a record.
    pub fn book_format(&self, record: &FileRecord) -> Option<BookFormat> {
        BookFormat::detect(&record.format, &record.name)
    }

    /// Engine factory able to load URLs issued by this state's blob store.
    pub fn engine_factory(&self) -> ArchiveEngineFactory {
        ArchiveEngineFactory::with_blobs(self.blobs.clone())
    }
}
