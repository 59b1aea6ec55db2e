use crate::error::{HealthResponse, UnhealthyResponse};
use crate::routes;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use chrono::Local;

/// GET /api/health handler - Health check endpoint
///
/// Verifies that every data directory is present.
/// Returns 200 OK if storage is usable, 503 Service Unavailable otherwise.
#[utoipa::path(
    get,
    path = routes::HEALTH,
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = UnhealthyResponse)
    ),
    tag = "health"
)]
pub async fn health_handler(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<HealthResponse>), (StatusCode, Json<UnhealthyResponse>)> {
    let timestamp = Local::now().to_rfc3339();

    match state.store.health_check().await {
        Ok(()) => {
            tracing::debug!("Health check passed");
            Ok((
                StatusCode::OK,
                Json(HealthResponse {
                    status: "ok".to_string(),
                    timestamp,
                }),
            ))
        }
        Err(e) => {
            tracing::error!("Health check failed: {:#}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(UnhealthyResponse {
                    status: "unhealthy".to_string(),
                    error: format!("Storage unavailable: {:#}", e),
                    timestamp,
                }),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{get_request, send};
    use crate::storage::Area;
    use axum::{Router, routing::get};

    fn app(state: AppState) -> Router {
        Router::new()
            .route(routes::HEALTH, get(health_handler))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_health_endpoint_healthy() {
        let (_dir, state) = AppState::for_tests().await;

        let (status, body) = send(app(state), get_request("/api/health")).await;

        assert_eq!(status, StatusCode::OK);
        let response: HealthResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status, "ok");
        assert!(chrono::DateTime::parse_from_rfc3339(&response.timestamp).is_ok());
    }

    #[tokio::test]
    async fn test_health_endpoint_unhealthy() {
        let (_dir, state) = AppState::for_tests().await;
        std::fs::remove_dir_all(state.store.dir(Area::Chunk)).unwrap();

        let (status, body) = send(app(state), get_request("/api/health")).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let response: UnhealthyResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.status, "unhealthy");
        assert!(response.error.contains("Storage unavailable"));
    }
}
