pub mod chunk;
pub mod embedding;
pub mod files;
pub mod health;
pub mod upload;
pub mod vectors;
pub mod views;

pub use chunk::chunk_handler;
pub use embedding::{embedding_handler, embedding_stats_handler};
pub use files::{chunked_files_handler, loaded_files_handler};
pub use health::health_handler;
pub use upload::upload_handler;
pub use vectors::{collections_handler, search_handler, store_vectors_handler, vector_files_handler};
pub use views::view_fallback_handler;

use crate::error::ApiError;

/// Required string field, treating blank values as absent.
pub(crate) fn required(value: Option<String>, field: &'static str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ApiError::MissingField(field))
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{Router, body::Body, http::Request, http::StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(body).unwrap()))
            .unwrap()
    }

    pub fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }
}
