use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Error response type
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Response type for health check endpoint
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

/// Response type for unhealthy status
#[derive(Serialize, Deserialize, utoipa::ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
    pub timestamp: String,
}

/// Failures raised by the document pipeline services.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unsafe or invalid file name: '{0}'")]
    UnsafeFilename(String),
    #[error("file type not allowed: '{0}'")]
    FileTypeNotAllowed(String),
    #[error("file is not UTF-8 text: {0}")]
    NotText(String),
    #[error("no {kind} file found with id '{id}'")]
    NotFound { kind: &'static str, id: String },
    #[error("file content is empty")]
    EmptyContent,
    #[error("unsupported chunk method: '{0}'")]
    UnsupportedMethod(String),
    #[error("invalid chunk parameters: {0}")]
    InvalidChunkParams(String),
    #[error("chunking produced no content")]
    NoChunks,
    #[error("unsupported model type: '{0}'")]
    UnsupportedModel(String),
    #[error("embedding model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("embedding provider error: {0}")]
    Embedding(String),
    #[error("invalid collection name: '{0}'")]
    InvalidCollectionName(String),
    #[error("collection not found: '{0}'")]
    CollectionNotFound(String),
    #[error("invalid embedding dimension: {0}")]
    InvalidDimension(String),
    #[error("unknown metric '{0}', expected L2 or IP")]
    InvalidMetric(String),
    #[error("no valid chunks with embeddings found for insertion")]
    NoVectors,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound { .. } | ServiceError::CollectionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Embedding(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Custom error type for API endpoints
///
/// Every variant renders as `{"success": false, "error": ...}` with the
/// matching HTTP status code.
#[derive(Debug)]
pub enum ApiError {
    /// Required request field absent or empty
    MissingField(&'static str),
    /// Request body or parameter could not be used
    InvalidRequest(String),
    /// Upload exceeded the configured body limit
    PayloadTooLarge(usize),
    /// Error raised by a pipeline service
    Service(ServiceError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::MissingField(field) => {
                (StatusCode::BAD_REQUEST, format!("Missing required field: {}", field))
            }
            ApiError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, format!("Invalid request: {}", msg))
            }
            ApiError::PayloadTooLarge(limit) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("Upload exceeds the limit of {} bytes", limit),
            ),
            ApiError::Service(err) => {
                let status = err.status();
                if status.is_server_error() {
                    tracing::error!("Request failed: {:#}", err);
                } else {
                    tracing::warn!("Request rejected: {}", err);
                }
                (status, err.to_string())
            }
        };

        let body = Json(ErrorResponse {
            success: false,
            error: error_message,
        });

        (status, body).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn render(err: ApiError) -> (StatusCode, ErrorResponse) {
        let response = err.into_response();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_not_found_maps_to_404() {
        let (status, body) = render(
            ServiceError::NotFound {
                kind: "load",
                id: "report_20240101000000".to_string(),
            }
            .into(),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert!(body.error.contains("report_20240101000000"));
    }

    #[tokio::test]
    async fn test_provider_failure_maps_to_502() {
        let (status, _) =
            render(ServiceError::Embedding("connection refused".to_string()).into()).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_storage_failure_maps_to_500() {
        let (status, _) = render(ServiceError::Storage(anyhow::anyhow!("disk full")).into()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_missing_field_message() {
        let (status, body) = render(ApiError::MissingField("fileId")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "Missing required field: fileId");
    }

    #[tokio::test]
    async fn test_payload_too_large_maps_to_413() {
        let (status, body) = render(ApiError::PayloadTooLarge(1024)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body.error.contains("1024"));
    }

    #[tokio::test]
    async fn test_validation_errors_map_to_400() {
        for err in [
            ServiceError::EmptyContent,
            ServiceError::NoChunks,
            ServiceError::UnsupportedMethod("magic".to_string()),
            ServiceError::NoVectors,
        ] {
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }
}
