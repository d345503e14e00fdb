//! Document upload and management endpoints

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::service::{CollectionStats, DeleteOutcome, QaService, UploadOutcome};
use crate::types::Document;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    pub total: usize,
}

/// POST /api/v1/documents/upload - multipart field `file`
pub async fn upload(State(service): State<QaService>, mut multipart: Multipart) -> Result<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::ingest("upload", format!("Failed to read multipart field: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let mime_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| Error::ingest(&filename, format!("Failed to read file: {}", e)))?;

        let outcome = service.upload(&filename, bytes.to_vec(), mime_type).await?;
        let message = format!(
            "Document '{}' processed into {} chunks",
            outcome.source_name, outcome.total_chunks
        );
        return Ok(Json(UploadResponse {
            success: true,
            outcome,
            message,
        }));
    }

    Err(Error::ingest("upload", "No file field in multipart body"))
}

/// GET /api/v1/documents/stats
pub async fn stats(State(service): State<QaService>) -> Result<Json<CollectionStats>> {
    Ok(Json(service.stats().await?))
}

/// GET /api/v1/documents/list
pub async fn list(State(service): State<QaService>) -> Json<DocumentListResponse> {
    let documents = service.list();
    let total = documents.len();
    Json(DocumentListResponse { documents, total })
}

/// DELETE /api/v1/documents/:id
pub async fn delete(
    State(service): State<QaService>,
    Path(id): Path<Uuid>,
) -> Result<(StatusCode, Json<DeleteOutcome>)> {
    match service.delete(id).await? {
        DeleteOutcome::NotFound => Err(Error::DocumentNotFound(id.to_string())),
        outcome => Ok((StatusCode::OK, Json(outcome))),
    }
}
