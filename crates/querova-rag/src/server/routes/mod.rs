//! API routes, mounted under `/api/v1`

pub mod documents;
pub mod questions;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::service::QaService;

pub fn api_routes(max_upload_size: usize) -> Router<QaService> {
    // Multipart framing adds a little on top of the file itself
    let body_limit = max_upload_size.saturating_add(64 * 1024);

    Router::new()
        .route(
            "/documents/upload",
            post(documents::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/documents/stats", get(documents::stats))
        .route("/documents/list", get(documents::list))
        .route("/documents/:id", delete(documents::delete))
        .route("/questions/single", post(questions::single))
        .route("/questions/process", post(questions::process))
        .route(
            "/questions/upload-json",
            post(questions::upload_json).layer(DefaultBodyLimit::max(body_limit)),
        )
}
