use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Arc;

const FILE_COLUMNS: &str = "id, name, format, size, content_url, content, created_at";
/// Listing columns; inline content is left behind.
const LIST_COLUMNS: &str = "id, name, format, size, content_url, NULL, created_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- Uploaded files
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                format TEXT NOT NULL,
                size INTEGER NOT NULL,
                content_url TEXT,
                content BLOB,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_created ON files(created_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== FILE OPERATIONS ==========

    /// Insert a new file record and return it.
    pub fn create_file(&self, file: &NewFile) -> Result<FileRecord> {
        let conn = self.conn.lock();
        let created_at = now_timestamp();

        conn.execute(
            "INSERT INTO files (name, format, size, content_url, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                file.name,
                file.format,
                file.size,
                file.content_url,
                file.content,
                created_at,
            ],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create file: {}", e)))?;

        Ok(FileRecord {
            id: conn.last_insert_rowid(),
            name: file.name.clone(),
            format: file.format.clone(),
            size: file.size,
            content_url: file.content_url.clone(),
            content: file.content.clone(),
            created_at,
        })
    }

    /// Get a file record by ID.
    pub fn get_file(&self, id: i64) -> Result<Option<FileRecord>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {} FROM files WHERE id = ?1", FILE_COLUMNS),
            params![id],
            Self::row_to_file,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get file: {}", e)))
    }

    /// List all file records in insertion order, without inline content.
    pub fn list_files(&self) -> Result<Vec<FileRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!("SELECT {} FROM files ORDER BY id", LIST_COLUMNS))
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let files = stmt
            .query_map([], Self::row_to_file)
            .map_err(|e| AppError::Internal(format!("Failed to list files: {}", e)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(files)
    }

    /// Count file records.
    pub fn count_files(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))
            .map_err(|e| AppError::Internal(format!("Failed to count files: {}", e)))?;
        Ok(count as usize)
    }

    fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
        Ok(FileRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            format: row.get(2)?,
            size: row.get(3)?,
            content_url: row.get(4)?,
            content: row.get(5)?,
            created_at: row.get(6)?,
        })
    }
}
