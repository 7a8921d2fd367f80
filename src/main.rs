//! beyond-reader server entry point.

use beyond_reader::{
    config::{Cli, Command, Config, FilesCommand},
    db::{self, Database},
    formats::EpubPackage,
    reader::NavItem,
    server,
    storage::LocalBlobStore,
    upload,
};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    init_logging();

    match cli.command {
        Some(Command::Init { force }) => cmd_init(force).await,
        Some(Command::Files { action }) => cmd_files(action, &config).await,
        Some(Command::Toc { path }) => cmd_toc(&path),
        Some(Command::Serve { bind }) => cmd_serve(config, bind).await,
        None => cmd_serve(config, None).await,
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beyond_reader=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_database(config: &Config) -> anyhow::Result<Database> {
    Ok(Database::open(&config.database.path)?)
}

/// Initialize config, database and blob directory.
async fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = open_database(&config)?;
    println!("Initialized database: {}", config.database.path.display());

    let blobs = LocalBlobStore::from_config(&config.storage)?;
    println!("Initialized blob storage: {}", blobs.root().display());

    println!("\nEdit config.toml to configure your server.");
    println!("Then run: beyond-reader serve");

    Ok(())
}

/// File management commands.
async fn cmd_files(action: FilesCommand, config: &Config) -> anyhow::Result<()> {
    let db = open_database(config)?;

    match action {
        FilesCommand::List => {
            let files = db.list_files()?;
            if files.is_empty() {
                println!("No files uploaded.");
            } else {
                println!("{:<6} {:<40} {:<28} {:>10}", "ID", "NAME", "FORMAT", "SIZE");
                println!("{}", "-".repeat(88));
                for file in files {
                    println!(
                        "{:<6} {:<40} {:<28} {:>10}",
                        file.id, file.name, file.format, file.size
                    );
                }
            }
        }

        FilesCommand::Show { id } => match db.get_file(id)? {
            Some(file) => {
                let uploaded = db::timestamp_to_datetime(file.created_at);
                println!("ID:       {}", file.id);
                println!("Name:     {}", file.name);
                println!("Format:   {}", file.format);
                println!("Size:     {} bytes", file.size);
                println!("Uploaded: {}", uploaded.format("%Y-%m-%d %H:%M"));
                match (&file.content_url, &file.content) {
                    (Some(url), _) => println!("Content:  {}", url),
                    (None, Some(content)) => println!("Content:  inline, {} bytes", content.len()),
                    (None, None) => println!("Content:  none"),
                }
            }
            None => println!("File not found: {}", id),
        },

        FilesCommand::Add { path } => {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| anyhow::anyhow!("Invalid file name: {}", path.display()))?
                .to_string();
            let data = std::fs::read(&path)?;
            let blobs = LocalBlobStore::from_config(&config.storage)?;

            let record = upload::upload_and_persist(&blobs, &db, &name, None, &data)?;
            println!(
                "Added file: {} (id: {}, format: {})",
                record.name, record.id, record.format
            );
        }
    }

    Ok(())
}

/// Print an EPUB's table of contents.
fn cmd_toc(path: &Path) -> anyhow::Result<()> {
    let package = EpubPackage::open(path)?;

    if let Some(title) = &package.title {
        println!("{}", title);
        println!("{}", "-".repeat(title.chars().count()));
    }
    if package.toc.is_empty() {
        println!("No table of contents.");
    }
    print_toc(&package.toc, 0);

    Ok(())
}

fn print_toc(items: &[NavItem], depth: usize) {
    for item in items {
        println!("{}{}  {}", "  ".repeat(depth), item.label, item.href);
        print_toc(&item.subitems, depth + 1);
    }
}

/// Start the server.
async fn cmd_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(addr) = bind {
        config.server.bind = addr;
    }

    let db = open_database(&config)?;
    let blobs = LocalBlobStore::from_config(&config.storage)?;

    tracing::info!(
        bind = %config.server.bind,
        database = %config.database.path.display(),
        storage = %blobs.root().display(),
        files = db.count_files()?,
        "Starting beyond-reader server"
    );

    let bind = config.server.bind;
    let state = server::AppState::new(config, db, blobs);
    let app = server::create_router(state);

    let listener = TcpListener::bind(bind).await?;
    tracing::info!(address = %bind, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
