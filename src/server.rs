//! HTTP server and routes.

pub(crate) mod handlers;
mod state;

pub use handlers::{PageHost, ReadQuery};
pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let book_routes = Router::new()
        .route("/", get(handlers::books_page))
        .route("/{id}", get(handlers::book_page))
        .route("/{id}/read", get(handlers::reader_page))
        .route("/{id}/content", get(handlers::book_content))
        .route("/{id}/section/{*href}", get(handlers::book_section));

    let api_routes = Router::new()
        .route("/files", post(handlers::api_create_file))
        .route("/books", get(handlers::api_books))
        .route("/books/{id}", get(handlers::api_book))
        .route("/books/{id}/toc", get(handlers::api_book_toc));

    let body_limit = state.config.upload.max_size_bytes();

    Router::new()
        .route("/", get(handlers::index))
        .route("/upload", post(handlers::upload_form))
        .route("/blobs/{key}", get(handlers::blob))
        .nest("/books", book_routes)
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
