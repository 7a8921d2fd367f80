mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Uploaded file record.
///
/// Exactly one of `content_url` and `content` is expected to be set, but the
/// table does not enforce it: older rows may carry inline bytes while new
/// uploads only reference a blob URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Auto-increment ID.
    pub id: i64,
    /// Display name (the uploaded file name).
    pub name: String,
    /// Declared MIME type.
    pub format: String,
    /// Size in bytes.
    pub size: i64,
    /// Remote content URL issued by the blob store.
    pub content_url: Option<String>,
    /// Inline content bytes.
    #[serde(skip_serializing)]
    pub content: Option<Vec<u8>>,
    /// Creation timestamp.
    pub created_at: i64,
}

impl FileRecord {
    /// Whether the record has any way to reach its bytes.
    pub fn has_content(&self) -> bool {
        self.content_url.is_some() || self.content.is_some()
    }
}

/// Data for a new file record.
#[derive(Debug, Clone, Default)]
pub struct NewFile {
    /// Display name.
    pub name: String,
    /// Declared MIME type.
    pub format: String,
    /// Size in bytes.
    pub size: i64,
    /// Content URL.
    pub content_url: Option<String>,
    /// Inline content.
    pub content: Option<Vec<u8>>,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
