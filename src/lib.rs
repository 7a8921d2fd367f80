//! beyond-reader: a small self-hosted shelf for ebooks.
//!
//! Files are uploaded through a form (or the JSON API), stored in a blob
//! store and recorded in SQLite. Uploaded EPUBs can be read in the browser
//! through a server-driven reader built on the [`reader`] components.
//!
//! # Features
//!
//! - Upload form and JSON record API
//! - Listing and detail pages
//! - EPUB reader with table of contents and paging
//! - Local blob storage with opaque keys

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Book formats and the bundled EPUB engine.
pub mod formats;
/// ePub viewer and reader chrome.
pub mod reader;
/// HTTP server.
pub mod server;
/// Blob storage.
pub mod storage;
/// Upload flow.
pub mod upload;


pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
