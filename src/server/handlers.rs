//! HTTP request handlers.

use crate::config::BookFormat;
use crate::db::{self, FileRecord};
use crate::error::{AppError, Result};
use crate::formats::{self, EpubPackage};
use crate::reader::toc::{INDENT_PX, NavItem, TocNode};
use crate::reader::{
    BookOptions, EngineFactory, EpubEngine, KeyListeners, Reader, ReaderLayout, ReaderProps,
    RenditionOverrides, ViewerHost, ViewerProps,
};
use crate::server::AppState;
use crate::storage::BlobStore;
use crate::upload::{self, UploadedFile};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use quick_xml::escape::escape;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::io::ReaderStream;

/// Build a response, returning 500 on error (which shouldn't happen).
fn build_response(status: StatusCode, content_type: &str, body: impl Into<Body>) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap_or_else(|_| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body(Body::from("Internal error"))
                .unwrap_or_default()
        })
}

/// Wrap a body in the shared page skeleton.
fn page(site_title: &str, heading: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{heading} - {site}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 800px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        a {{ color: #0066cc; }}
        .card {{ background: #f5f5f5; padding: 1rem; border-radius: 8px; margin: 1rem 0; }}
        .pager {{ display: flex; justify-content: space-between; margin: 1rem 0; }}
        .toc ul {{ list-style: none; margin: 0; padding-left: 0; }}
        iframe {{ width: 100%; height: 75vh; border: 1px solid #ddd; border-radius: 8px; }}
    </style>
</head>
<body>
    <h1>{heading}</h1>
{body}
</body>
</html>"#,
        site = escape(site_title),
        heading = escape(heading),
        body = body,
    ))
}

/// Percent-encode every segment of an archive path.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_link(id: i64, location: &str) -> String {
    format!("/books/{}/read?location={}", id, urlencoding::encode(location))
}

// ============================================================================
// UPLOAD
// ============================================================================

/// Upload form.
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let body = format!(
        r#"    <form class="card" action="/upload" method="post" enctype="multipart/form-data">
        <input type="file" name="file" accept=".epub,application/epub+zip">
        <button type="submit">Upload</button>
    </form>
    <p>Files up to {max} MB. <a href="/books">Browse uploaded books</a></p>"#,
        max = state.config.upload.max_size_mb,
    );
    page(&state.config.server.title, &state.config.server.title, &body)
}

struct FormUpload {
    name: String,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Pull the `file` field out of the form. `None` when no file was chosen.
async fn read_upload(
    multipart: &mut Multipart,
) -> std::result::Result<Option<FormUpload>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(String::from);
        let data = field.bytes().await?;
        if name.is_empty() || data.is_empty() {
            return Ok(None);
        }
        return Ok(Some(FormUpload {
            name,
            content_type,
            data: data.to_vec(),
        }));
    }
    Ok(None)
}

/// Form upload. Always redirects: to the listing on success, home otherwise.
pub async fn upload_form(State(state): State<AppState>, mut multipart: Multipart) -> Redirect {
    let upload = match read_upload(&mut multipart).await {
        Ok(Some(upload)) => upload,
        Ok(None) => {
            tracing::debug!("Upload submitted without a file");
            return Redirect::to("/");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read upload form");
            return Redirect::to("/");
        }
    };

    let name = upload.name.clone();
    let stored = tokio::task::spawn_blocking(move || {
        upload::upload_and_persist(
            state.blobs.as_ref(),
            &state.db,
            &upload.name,
            upload.content_type.as_deref(),
            &upload.data,
        )
    })
    .await
    .map_err(|e| AppError::Internal(format!("Upload task failed: {}", e)))
    .and_then(|stored| stored);

    match stored {
        Ok(_) => Redirect::to("/books"),
        Err(e) => {
            tracing::error!(error = %e, name = %name, "Upload failed");
            Redirect::to("/")
        }
    }
}

/// Record a file that is already in the blob store. URLs this store did not
/// issue are rejected, so content links never leave the site.
pub async fn api_create_file(
    State(state): State<AppState>,
    Json(file): Json<UploadedFile>,
) -> Result<(StatusCode, Json<FileRecord>)> {
    if file.name.trim().is_empty() || file.url.trim().is_empty() {
        return Err(AppError::InvalidFormat("name and url are required".into()));
    }
    if state.blobs.key_from_url(&file.url).is_none() {
        return Err(AppError::InvalidFormat(format!("Not a stored blob URL: {}", file.url)));
    }
    let record = upload::persist_upload(&state.db, &file)?;
    Ok((StatusCode::CREATED, Json(record)))
}

// ============================================================================
// LISTING / DETAIL
// ============================================================================

/// List of uploaded books.
pub async fn books_page(State(state): State<AppState>) -> Html<String> {
    let files = state.db.list_files().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to list files");
        Vec::new()
    });

    let items: String = files
        .iter()
        .map(|file| {
            format!(
                "        <li><a href=\"/books/{}\">{}</a></li>\n",
                file.id,
                escape(&file.name)
            )
        })
        .collect();
    let body = format!("    <ul>\n{}    </ul>\n    <p><a href=\"/\">Upload</a></p>", items);
    page(&state.config.server.title, "Books", &body)
}

fn fallback_page(state: &AppState) -> Html<String> {
    page(
        &state.config.server.title,
        "Books",
        "    <p><a href=\"/books\">Back to all books</a></p>",
    )
}

/// Detail page. Anything that goes wrong renders the fallback page.
pub async fn book_page(State(state): State<AppState>, Path(id): Path<String>) -> Html<String> {
    let id = match id.parse::<i64>() {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Invalid book id");
            return fallback_page(&state);
        }
    };

    let record = match state.require_file(id) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(id, error = %e, "Failed to load book");
            return fallback_page(&state);
        }
    };

    let uploaded = db::timestamp_to_datetime(record.created_at).format("%Y-%m-%d %H:%M");
    let read_link = match state.book_format(&record) {
        Some(format) if formats::is_readable(format) => {
            format!("<a href=\"/books/{}/read\">Read</a> | ", record.id)
        }
        _ => String::new(),
    };
    let body = format!(
        r#"    <div class="card">
        <p>Format: {format}</p>
        <p>Size: {size} bytes</p>
        <p>Uploaded: {uploaded}</p>
    </div>
    <p>{read_link}<a href="/books/{id}/content">Download</a> | <a href="/books">All books</a></p>"#,
        format = escape(&record.format),
        size = record.size,
        uploaded = uploaded,
        read_link = read_link,
        id = record.id,
    );
    page(&state.config.server.title, &record.name, &body)
}

/// All records as JSON.
pub async fn api_books(State(state): State<AppState>) -> Result<Json<Vec<FileRecord>>> {
    Ok(Json(state.db.list_files()?))
}

/// One record as JSON.
pub async fn api_book(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<FileRecord>> {
    Ok(Json(state.require_file(id)?))
}

/// Table of contents of an EPUB record.
pub async fn api_book_toc(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<NavItem>>> {
    let record = state.require_file(id)?;
    ensure_readable(&state, &record)?;
    let data = state.book_bytes(&record)?;
    let package = EpubPackage::parse(Arc::from(data))?;
    Ok(Json(package.toc))
}

fn ensure_readable(state: &AppState, record: &FileRecord) -> Result<BookFormat> {
    let format = state
        .book_format(record)
        .ok_or_else(|| AppError::InvalidFormat(format!("Unknown format: {}", record.format)))?;
    formats::ensure_readable(format)?;
    Ok(format)
}

// ============================================================================
// CONTENT
// ============================================================================

/// Book bytes. Blob-backed records redirect to their URL.
pub async fn book_content(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response> {
    let record = state.require_file(id)?;
    if let Some(url) = &record.content_url {
        return Ok(Redirect::temporary(url).into_response());
    }

    let data = state.book_bytes(&record)?;
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &record.format);
    Ok(stored_file_headers(builder, state.book_format(&record))
        .body(Body::from(data))
        .unwrap_or_else(|_| Response::default()))
}

/// Uploaded bytes are never rendered as pages of this site: only EPUBs are
/// served inline and sniffing is disabled for everything.
fn stored_file_headers(
    builder: axum::http::response::Builder,
    format: Option<BookFormat>,
) -> axum::http::response::Builder {
    let builder = builder.header(header::X_CONTENT_TYPE_OPTIONS, "nosniff");
    match format {
        Some(BookFormat::Epub) => builder,
        _ => builder.header(header::CONTENT_DISPOSITION, "attachment"),
    }
}

/// One archive member of an EPUB, for the reader's frame.
pub async fn book_section(
    State(state): State<AppState>,
    Path((id, href)): Path<(i64, String)>,
) -> Result<Response> {
    let record = state.require_file(id)?;
    ensure_readable(&state, &record)?;
    let source = state.book_source(&record)?;

    let mut engine = state
        .engine_factory()
        .construct(&source, &BookOptions::for_source(&source))?;
    let data = engine.resource(&href);
    engine.destroy();

    let mut response = build_response(StatusCode::OK, resource_mime(&href), data?);
    // Book markup may carry scripts; run it in an opaque, script-less origin.
    response.headers_mut().insert(
        header::CONTENT_SECURITY_POLICY,
        header::HeaderValue::from_static("sandbox"),
    );
    Ok(response)
}

fn resource_mime(href: &str) -> &'static str {
    let ext = href
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xhtml" | "xht" => "application/xhtml+xml",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ttf" | "otf" => "font/ttf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => "application/octet-stream",
    }
}

/// Serve a stored blob.
pub async fn blob(State(state): State<AppState>, Path(key): Path<String>) -> Result<Response<Body>> {
    let path = state.blobs.path_for(&key)?;
    let file = tokio::fs::File::open(&path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AppError::NotFound(format!("Blob not found: {}", key)),
        _ => AppError::Io(e),
    })?;
    let size = file.metadata().await?.len();

    let format = key
        .rsplit_once('.')
        .and_then(|(_, ext)| BookFormat::from_extension(ext));
    let content_type = format.map(|f| f.mime_type()).unwrap_or(upload::FALLBACK_MIME);

    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size);
    Ok(stored_file_headers(builder, format)
        .body(Body::from_stream(ReaderStream::new(file)))
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// READER
// ============================================================================

/// Query of the reader page.
#[derive(Debug, Default, Deserialize)]
pub struct ReadQuery {
    /// Location to open.
    pub location: Option<String>,
    /// `next` or `prev`.
    pub turn: Option<String>,
}

/// Reader host for one request: remembers the last reported location.
#[derive(Debug, Default)]
pub struct PageHost {
    /// Last location reported by the viewer or picked in the toc.
    pub observed: Option<String>,
}

impl ViewerHost for PageHost {
    fn location_changed(&mut self, location: &str) {
        self.observed = Some(location.to_string());
    }
}

enum ReaderOutcome {
    Redirect(String),
    Page(Html<String>),
}

/// Server-driven reader page.
pub async fn reader_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<ReadQuery>,
) -> Result<Response> {
    let outcome = tokio::task::spawn_blocking(move || run_reader(&state, id, query))
        .await
        .map_err(|e| AppError::Internal(format!("Reader task failed: {}", e)))??;

    Ok(match outcome {
        ReaderOutcome::Redirect(location) => Redirect::to(&location).into_response(),
        ReaderOutcome::Page(html) => html.into_response(),
    })
}

fn run_reader(state: &AppState, id: i64, query: ReadQuery) -> Result<ReaderOutcome> {
    let record = state.require_file(id)?;
    ensure_readable(state, &record)?;

    let source = state.book_source(&record)?;
    let options = BookOptions::for_source(&source);
    let mut viewer = ViewerProps::new(source)
        .with_init_options(options)
        .with_rendition(RenditionOverrides::from(&state.config.reader));
    if let Some(location) = query.location.as_deref().filter(|l| !l.is_empty()) {
        viewer = viewer.with_location(location);
    }
    let props = ReaderProps {
        viewer,
        title: record.name.clone(),
        show_toc: state.config.reader.show_toc,
        swipeable: state.config.reader.swipeable,
    };

    let mut reader = Reader::new(
        state.engine_factory(),
        PageHost::default(),
        KeyListeners::new(),
        props,
    );
    reader.mount();
    reader.tick();

    match query.turn.as_deref() {
        Some("next") => {
            reader.next();
        }
        Some("prev") => {
            reader.prev();
        }
        Some(other) => tracing::debug!(turn = %other, "Ignoring unknown page command"),
        None => {}
    }

    if let Some(location) = reader.host().observed.clone()
        && query.location.as_deref() != Some(location.as_str())
    {
        reader.unmount();
        return Ok(ReaderOutcome::Redirect(read_link(id, &location)));
    }

    reader.toggle_toc();
    let layout = reader.layout();
    let title = reader
        .view()
        .engine()
        .and_then(|engine| engine.title())
        .unwrap_or(&record.name)
        .to_string();
    let current = reader
        .view()
        .rendition()
        .map(|rendition| rendition.current().to_string());
    let location = reader
        .view()
        .state()
        .location()
        .map(String::from)
        .or_else(|| current.clone());
    reader.unmount();

    let body = match (layout.loading, current) {
        (false, Some(current)) => render_reader(id, &layout, &current, location.as_deref()),
        _ => {
            tracing::warn!(id, "Book could not be opened in the reader");
            format!(
                "    <p>This book could not be opened.</p>\n    <p><a href=\"/books/{}\">Back</a></p>",
                id
            )
        }
    };
    Ok(ReaderOutcome::Page(page(
        &state.config.server.title,
        &title,
        &body,
    )))
}

fn render_reader(id: i64, layout: &ReaderLayout, current: &str, location: Option<&str>) -> String {
    let mut body = String::new();
    body.push_str(&format!(
        "    <p><a href=\"/books/{}\">Back to details</a></p>\n",
        id
    ));

    if layout.show_toc_toggle {
        body.push_str("    <details class=\"toc\">\n        <summary>Contents</summary>\n");
        render_toc(id, &layout.toc, &mut body);
        body.push_str("    </details>\n");
    }

    let here = urlencoding::encode(location.unwrap_or(current)).into_owned();
    body.push_str(&format!(
        r#"    <div class="pager">
        <a href="/books/{id}/read?location={here}&turn=prev">Previous</a>
        <a href="/books/{id}/read?location={here}&turn=next">Next</a>
    </div>
    <iframe src="/books/{id}/section/{section}" title="{title}"></iframe>
"#,
        id = id,
        here = here,
        section = encode_path(current),
        title = escape(&layout.title),
    ));
    body
}

fn render_toc(id: i64, nodes: &[TocNode], out: &mut String) {
    out.push_str(&format!("<ul style=\"padding-left: {}px\">", INDENT_PX));
    for node in nodes {
        out.push_str(&format!("<li data-key=\"{}\">", node.key));
        if node.href.is_empty() {
            out.push_str(&escape(&node.label));
        } else {
            out.push_str(&format!(
                "<a href=\"{}\">{}</a>",
                escape(&read_link(id, &node.href)),
                escape(&node.label)
            ));
        }
        if !node.children.is_empty() {
            render_toc(id, &node.children, out);
        }
        out.push_str("</li>");
    }
    out.push_str("</ul>\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::toc;

    #[test]
    fn test_resource_mime() {
        assert_eq!(resource_mime("text/ch1.xhtml"), "application/xhtml+xml");
        assert_eq!(resource_mime("images/Cover.JPG"), "image/jpeg");
        assert_eq!(resource_mime("README"), "application/octet-stream");
    }

    #[test]
    fn test_encode_path_keeps_slashes() {
        assert_eq!(encode_path("text/chapter 1.xhtml"), "text/chapter%201.xhtml");
    }

    #[test]
    fn test_render_toc_links_and_nesting() {
        let tree = toc::build_tree(&[NavItem::new("Part <1>", "").with_subitems(vec![
            NavItem::new("Chapter", "ch1.xhtml#a"),
        ])]);
        let mut out = String::new();
        render_toc(7, &tree, &mut out);

        assert!(out.contains("Part &lt;1&gt;"));
        assert!(out.contains("data-key=\"0.0\""));
        assert!(out.contains("href=\"/books/7/read?location=ch1.xhtml%23a\""));
        assert_eq!(out.matches("<ul").count(), 2);
    }
}
