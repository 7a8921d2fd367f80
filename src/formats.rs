//! Book format support.
//!
//! Only EPUB can be opened in the reader; every other format is stored and
//! served as-is.

mod epub;

pub use epub::{ArchiveEngine, ArchiveEngineFactory, ArchiveRendition, EpubPackage};

#[cfg(test)]
pub(crate) use epub::tests::sample_epub;

use crate::config::BookFormat;
use crate::error::{AppError, Result};

/// Whether files of this format can be opened in the reader.
pub fn is_readable(format: BookFormat) -> bool {
    matches!(format, BookFormat::Epub)
}

/// Fail with `InvalidFormat` unless the format can be opened in the reader.
pub fn ensure_readable(format: BookFormat) -> Result<()> {
    if is_readable(format) {
        Ok(())
    } else {
        Err(AppError::InvalidFormat(format!(
            "{} files cannot be opened in the reader",
            format.extension()
        )))
    }
}
