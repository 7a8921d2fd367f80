use crate::reader::Flow;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Self-hosted ebook shelf: upload, browse and read EPUB files.
#[derive(Parser, Debug, Clone)]
#[command(name = "beyond-reader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "BEYOND_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the server (default if no command given).
    Serve {
        /// Address to bind the server to.
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Uploaded file management commands.
    Files {
        /// Files subcommand action.
        #[command(subcommand)]
        action: FilesCommand,
    },

    /// Print the table of contents of an EPUB file.
    Toc {
        /// Path to the EPUB file.
        path: PathBuf,
    },

    /// Initialize database and create default config.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
}

/// File management subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum FilesCommand {
    /// List all uploaded files.
    List,

    /// Show one file record.
    Show {
        /// File record ID.
        id: i64,
    },

    /// Upload a file from disk, as the upload form would.
    Add {
        /// Path to the file.
        path: PathBuf,
    },
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Blob storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload configuration.
    #[serde(default)]
    pub upload: UploadConfig,

    /// Reader defaults.
    #[serde(default)]
    pub reader: ReaderConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to.
    #[serde(default = "default_bind")]
    pub bind: SocketAddr,

    /// Site title.
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            title: default_title(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::new(
        std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)),
        8080,
    )
}

fn default_title() -> String {
    "Beyond AI".to_string()
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/files.db")
}

/// Blob storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory where uploaded blobs are written.
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,

    /// URL prefix under which blobs are served.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
            public_url: default_public_url(),
        }
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("data/blobs")
}

fn default_public_url() -> String {
    "/blobs".to_string()
}

/// Upload configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum upload size in megabytes.
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_mb: default_max_size_mb(),
        }
    }
}

fn default_max_size_mb() -> usize {
    50
}

impl UploadConfig {
    /// Upload limit in bytes.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_mb * 1024 * 1024
    }
}

/// Reader defaults applied to every rendition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaderConfig {
    /// Rendition width.
    #[serde(default)]
    pub width: Option<String>,

    /// Rendition height.
    #[serde(default)]
    pub height: Option<String>,

    /// Rendition flow.
    #[serde(default)]
    pub flow: Option<Flow>,

    /// Allow popups inside rendered content.
    #[serde(default)]
    pub allow_popups: Option<bool>,

    /// Show the table of contents toggle and panel.
    #[serde(default = "default_show_toc")]
    pub show_toc: bool,

    /// Draw the swipe overlay above the rendition.
    #[serde(default)]
    pub swipeable: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            flow: None,
            allow_popups: None,
            show_toc: default_show_toc(),
            swipeable: false,
        }
    }
}

fn default_show_toc() -> bool {
    true
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("beyond-reader.toml"),
            dirs::config_dir()
                .map(|p| p.join("beyond-reader").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/beyond-reader/config.toml"),
        ];

        candidates.into_iter().find(|p| p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# beyond-reader configuration

[server]
bind = "0.0.0.0:8080"
title = "Beyond AI"

[database]
# path = "/var/lib/beyond-reader/files.db"

[storage]
# Directory where uploaded files are kept
# dir = "/var/lib/beyond-reader/blobs"
# URL prefix under which they are served
public_url = "/blobs"

[upload]
max_size_mb = 50

[reader]
# Rendition overrides (defaults: width/height "100%", flow "scrolled-doc")
# width = "100%"
# height = "100%"
# flow = "paginated"
# allow_popups = false
show_toc = true
swipeable = false
"#
        .to_string()
    }
}

/// Known book formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookFormat {
    /// EPUB format (Electronic Publication).
    Epub,
    /// PDF format (Portable Document Format).
    Pdf,
    /// CBZ format (Comic Book ZIP archive).
    Cbz,
    /// MOBI format (Mobipocket eBook).
    Mobi,
    /// FB2 format (FictionBook).
    Fb2,
    /// Plain text format.
    Txt,
    /// HTML format.
    Html,
}

impl BookFormat {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            BookFormat::Epub => "application/epub+zip",
            BookFormat::Pdf => "application/pdf",
            BookFormat::Cbz => "application/vnd.comicbook+zip",
            BookFormat::Mobi => "application/x-mobipocket-ebook",
            BookFormat::Fb2 => "application/x-fictionbook+xml",
            BookFormat::Txt => "text/plain",
            BookFormat::Html => "text/html",
        }
    }

    /// Try to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "epub" => Some(BookFormat::Epub),
            "pdf" => Some(BookFormat::Pdf),
            "cbz" => Some(BookFormat::Cbz),
            "mobi" | "azw" | "azw3" => Some(BookFormat::Mobi),
            "fb2" => Some(BookFormat::Fb2),
            "txt" => Some(BookFormat::Txt),
            "html" | "htm" => Some(BookFormat::Html),
            _ => None,
        }
    }

    /// Try to detect format from a declared MIME type (parameters ignored).
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "application/epub+zip" => Some(BookFormat::Epub),
            "application/pdf" => Some(BookFormat::Pdf),
            "application/vnd.comicbook+zip" | "application/x-cbz" => Some(BookFormat::Cbz),
            "application/x-mobipocket-ebook" | "application/vnd.amazon.ebook" => {
                Some(BookFormat::Mobi)
            }
            "application/x-fictionbook+xml" => Some(BookFormat::Fb2),
            "text/plain" => Some(BookFormat::Txt),
            "text/html" => Some(BookFormat::Html),
            _ => None,
        }
    }

    /// Extension used when storing a blob of this format.
    pub fn extension(&self) -> &'static str {
        match self {
            BookFormat::Epub => "epub",
            BookFormat::Pdf => "pdf",
            BookFormat::Cbz => "cbz",
            BookFormat::Mobi => "mobi",
            BookFormat::Fb2 => "fb2",
            BookFormat::Txt => "txt",
            BookFormat::Html => "html",
        }
    }

    /// Resolve a format from a declared MIME type, falling back to the file name.
    pub fn detect(declared: &str, file_name: &str) -> Option<Self> {
        Self::from_mime(declared).or_else(|| {
            std::path::Path::new(file_name)
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Self::from_extension)
        })
    }
}
