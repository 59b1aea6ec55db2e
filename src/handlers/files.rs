use crate::error::{ApiError, ErrorResponse};
use crate::models::{ChunkFilesResponse, LoadedFilesResponse};
use crate::routes;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::Local;

/// GET /api/files/load handler - List loaded documents
#[utoipa::path(
    get,
    path = routes::LOADED_FILES,
    responses(
        (status = 200, description = "Loaded documents", body = LoadedFilesResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn loaded_files_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<LoadedFilesResponse>), ApiError> {
    let files = state.loader.loaded_files().await?;
    tracing::info!("Listed {} loaded files", files.len());

    Ok((
        StatusCode::OK,
        Json(LoadedFilesResponse {
            success: true,
            files,
            timestamp: Local::now().to_rfc3339(),
        }),
    ))
}

/// GET /api/files/chunk handler - List chunk files, newest first
#[utoipa::path(
    get,
    path = routes::CHUNKED_FILES,
    responses(
        (status = 200, description = "Chunk files", body = ChunkFilesResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn chunked_files_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ChunkFilesResponse>), ApiError> {
    let files = state.chunks.chunked_files().await?;
    tracing::info!("Listed {} chunk files", files.len());

    Ok((
        StatusCode::OK,
        Json(ChunkFilesResponse {
            success: true,
            files,
            timestamp: Local::now().to_rfc3339(),
        }),
    ))
}
