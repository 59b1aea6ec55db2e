use crate::error::{ApiError, ErrorResponse};
use crate::handlers::embedding::model_type;
use crate::handlers::required;
use crate::models::{
    CollectionsResponse, SearchRequest, SearchResponse, StoreRequest, StoreResponse,
    VectorFilesResponse,
};
use crate::routes;
use crate::state::AppState;
use crate::vector_store::Metric;
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use chrono::Local;

pub const DEFAULT_TOP_K: usize = 5;
pub const MAX_TOP_K: usize = 100;

/// GET /api/vectors/files handler - Statistics of every embedding file
#[utoipa::path(
    get,
    path = routes::VECTOR_FILES,
    responses(
        (status = 200, description = "Embedding file statistics", body = VectorFilesResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "vectors"
)]
pub async fn vector_files_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<VectorFilesResponse>), ApiError> {
    let files = state.vectors.vector_file_stats().await?;

    Ok((
        StatusCode::OK,
        Json(VectorFilesResponse {
            success: true,
            files,
            timestamp: Local::now().to_rfc3339(),
        }),
    ))
}

/// POST /api/vectors/store handler - Insert an embedding file into a collection
///
/// The collection is created on first use. `dimension` defaults to the
/// length of the first vector and `metric` to L2. An existing collection
/// keeps its metric, which the response reports.
#[utoipa::path(
    post,
    path = routes::VECTOR_STORE,
    request_body = StoreRequest,
    responses(
        (status = 200, description = "Vectors stored", body = StoreResponse),
        (status = 400, description = "Invalid collection or dimension", body = ErrorResponse),
        (status = 404, description = "Unknown embedding file", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "vectors"
)]
pub async fn store_vectors_handler(
    State(state): State<AppState>,
    payload: Result<Json<StoreRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    let Json(request) = payload?;
    let embedding_file_id = required(request.embedding_file_id, "embeddingFileId")?;
    let collection_name = required(request.collection_name, "collectionName")?;
    let metric = match request.metric.as_deref().map(str::trim) {
        Some(m) if !m.is_empty() => m.parse::<Metric>()?,
        _ => Metric::default(),
    };

    let details = state
        .vectors
        .store_embeddings(&embedding_file_id, &collection_name, request.dimension, metric)
        .await?;

    Ok((
        StatusCode::OK,
        Json(StoreResponse {
            success: true,
            message: format!(
                "Stored {} vectors in collection '{}'",
                details.vectors_inserted, details.collection_name
            ),
            details,
        }),
    ))
}

/// GET /api/vectors/collections handler - List stored collections
#[utoipa::path(
    get,
    path = routes::VECTOR_COLLECTIONS,
    responses(
        (status = 200, description = "Collections", body = CollectionsResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "vectors"
)]
pub async fn collections_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CollectionsResponse>), ApiError> {
    let collections = state.vectors.collections().await?;

    Ok((
        StatusCode::OK,
        Json(CollectionsResponse {
            success: true,
            collections,
        }),
    ))
}

/// POST /api/vectors/search handler - Nearest neighbours in a collection
///
/// Exactly one of `query` (text, embedded with `modelType`) or `vector`
/// must be given. `topK` defaults to 5 and is capped at 100.
#[utoipa::path(
    post,
    path = routes::VECTOR_SEARCH,
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results, closest first", body = SearchResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 404, description = "Unknown collection", body = ErrorResponse),
        (status = 502, description = "Embedding provider failed", body = ErrorResponse)
    ),
    tag = "vectors"
)]
pub async fn search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SearchResponse>), ApiError> {
    let Json(request) = payload?;
    let collection_name = required(request.collection_name, "collectionName")?;

    let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K);
    if !(1..=MAX_TOP_K).contains(&top_k) {
        return Err(ApiError::InvalidRequest(format!(
            "topK must be between 1 and {}",
            MAX_TOP_K
        )));
    }

    let query = request.query.filter(|q| !q.trim().is_empty());
    let vector = match (query, request.vector) {
        (Some(text), None) => {
            let model = model_type(request.model_type.as_deref())?;
            state.embeddings.embed_text(model, &text).await?.embedding
        }
        (None, Some(vector)) if !vector.is_empty() => vector,
        (None, Some(_)) => {
            return Err(ApiError::InvalidRequest("vector must not be empty".to_string()));
        }
        _ => {
            return Err(ApiError::InvalidRequest(
                "provide exactly one of 'query' or 'vector'".to_string(),
            ));
        }
    };

    let results = state.vectors.search(&collection_name, &vector, top_k).await?;
    tracing::info!("Search in '{}' returned {} results", collection_name, results.len());

    Ok((
        StatusCode::OK,
        Json(SearchResponse {
            success: true,
            collection_name,
            top_k,
            results,
        }),
    ))
}
