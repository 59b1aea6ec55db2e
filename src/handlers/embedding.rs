use crate::embedding::ModelType;
use crate::error::{ApiError, ErrorResponse};
use crate::handlers::required;
use crate::models::{EmbeddingRequest, EmbeddingResponse, EmbeddingStatsResponse, MessageResponse};
use crate::routes;
use crate::state::AppState;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Parse an optional model type, defaulting to HuggingFace.
pub(crate) fn model_type(value: Option<&str>) -> Result<ModelType, ApiError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.parse()?),
        _ => Ok(ModelType::default()),
    }
}

/// POST /api/embedding handler - Embed every chunk of a chunk file
#[utoipa::path(
    post,
    path = routes::EMBEDDING,
    request_body = EmbeddingRequest,
    responses(
        (status = 200, description = "Embedding file written", body = EmbeddingResponse),
        (status = 400, description = "Invalid request or unsupported model", body = ErrorResponse),
        (status = 404, description = "Unknown chunk file", body = ErrorResponse),
        (status = 502, description = "Embedding provider failed", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn embedding_handler(
    State(state): State<AppState>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<EmbeddingResponse>), ApiError> {
    let Json(request) = payload?;
    let chunk_file_id = required(request.chunk_file_id, "chunkFileId")?;
    let model = model_type(request.model_type.as_deref())?;

    tracing::info!("Generating embeddings for {} with {}", chunk_file_id, model);
    let outcome = state.embeddings.process(&chunk_file_id, model).await?;

    Ok((StatusCode::OK, Json(outcome.into())))
}

/// GET /api/embedding/stats handler - Statistics of the latest embedding file
#[utoipa::path(
    get,
    path = routes::EMBEDDING_STATS,
    responses(
        (status = 200, description = "Latest embedding statistics", body = EmbeddingStatsResponse),
        (status = 404, description = "No embedding file yet", body = MessageResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "pipeline"
)]
pub async fn embedding_stats_handler(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.embeddings.stats().await? {
        Some(stats) => {
            tracing::info!("Returning stats for {}", stats.embedding_file);
            Ok((
                StatusCode::OK,
                Json(EmbeddingStatsResponse {
                    success: true,
                    stats,
                }),
            )
                .into_response())
        }
        None => {
            tracing::warn!("No embedding file found");
            Ok((
                StatusCode::NOT_FOUND,
                Json(MessageResponse {
                    success: false,
                    message: "No embedding file found".to_string(),
                }),
            )
                .into_response())
        }
    }
}
