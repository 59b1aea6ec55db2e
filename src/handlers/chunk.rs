use crate::chunker::ChunkOptions;
use crate::error::{ApiError, ErrorResponse};
use crate::handlers::required;
use crate::models::{ChunkRequest, ChunkResponse};
use crate::routes;
use crate::state::AppState;
use axum::{Json, extract::State, extract::rejection::JsonRejection, http::StatusCode};

/// POST /api/chunk handler - Split a loaded document into chunks
///
/// Missing options fall back to the sentence method with size 500,
/// overlap 50 and separator `"\n\n"`.
#[utoipa::path(
    post,
    path = routes::CHUNK,
    request_body = ChunkRequest,
    responses(
        (status = 200, description = "Document chunked", body = ChunkResponse),
        (status = 400, description = "Invalid parameters or empty document", body = ErrorResponse),
        (status = 404, description = "Unknown file id", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn chunk_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChunkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ChunkResponse>), ApiError> {
    let Json(request) = payload?;
    let file_id = required(request.file_id, "fileId")?;

    let defaults = ChunkOptions::default();
    let options = ChunkOptions {
        method: match request.method.as_deref().map(str::trim) {
            Some(method) if !method.is_empty() => method.parse()?,
            _ => defaults.method,
        },
        chunk_size: request.chunk_size.unwrap_or(defaults.chunk_size),
        chunk_overlap: request.chunk_overlap.unwrap_or(defaults.chunk_overlap),
        separator: request.separator.unwrap_or(defaults.separator),
    };

    tracing::info!(
        "Chunking {}: method={}, size={}, overlap={}",
        file_id,
        options.method,
        options.chunk_size,
        options.chunk_overlap
    );
    let outcome = state.chunks.process(&file_id, &options).await?;

    Ok((StatusCode::OK, Json(outcome.into())))
}
