// Route path constants - single source of truth for all API paths

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api_doc::ApiDoc;
use crate::handlers;
use crate::state::AppState;

pub const API_PREFIX: &str = "/api";
pub const HEALTH: &str = "/api/health";
pub const UPLOAD: &str = "/api/upload";
pub const LOADED_FILES: &str = "/api/files/load";
pub const CHUNK: &str = "/api/chunk";
pub const CHUNKED_FILES: &str = "/api/files/chunk";
pub const EMBEDDING: &str = "/api/embedding";
pub const EMBEDDING_STATS: &str = "/api/embedding/stats";
pub const VECTOR_FILES: &str = "/api/vectors/files";
pub const VECTOR_STORE: &str = "/api/vectors/store";
pub const VECTOR_COLLECTIONS: &str = "/api/vectors/collections";
pub const VECTOR_SEARCH: &str = "/api/vectors/search";
pub const SWAGGER_UI: &str = "/swagger-ui";
pub const OPENAPI_JSON: &str = "/api-docs/openapi.json";

fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    match allowed_origin {
        "*" => layer.allow_origin(Any),
        origin => match HeaderValue::from_str(origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}', allowing any", origin);
                layer.allow_origin(Any)
            }
        },
    }
}

/// API routes, docs and the front-end fallback, without server-level layers.
pub fn api_router(state: AppState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .merge(SwaggerUi::new(SWAGGER_UI).url(OPENAPI_JSON, ApiDoc::openapi()))
        .route(HEALTH, get(handlers::health_handler))
        .route(
            UPLOAD,
            post(handlers::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(LOADED_FILES, get(handlers::loaded_files_handler))
        .route(CHUNK, post(handlers::chunk_handler))
        .route(CHUNKED_FILES, get(handlers::chunked_files_handler))
        .route(EMBEDDING, post(handlers::embedding_handler))
        .route(EMBEDDING_STATS, get(handlers::embedding_stats_handler))
        .route(VECTOR_FILES, get(handlers::vector_files_handler))
        .route(VECTOR_STORE, post(handlers::store_vectors_handler))
        .route(VECTOR_COLLECTIONS, get(handlers::collections_handler))
        .route(VECTOR_SEARCH, post(handlers::search_handler))
        .fallback(handlers::view_fallback_handler)
        .with_state(state)
}

/// Full application: routes plus CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_allowed_origin);
    api_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
