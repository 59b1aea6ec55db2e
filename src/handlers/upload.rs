use crate::error::{ApiError, ErrorResponse};
use crate::models::{UploadForm, UploadResponse};
use crate::routes;
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::StatusCode,
};

fn multipart_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(limit)
    } else {
        ApiError::InvalidRequest(err.body_text())
    }
}

/// POST /api/upload handler - Upload a document and extract its text
///
/// Expects a multipart form with a `file` part and an optional `type` part
/// naming the load method chosen by the client.
#[utoipa::path(
    post,
    path = routes::UPLOAD,
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored and loaded", body = UploadResponse),
        (status = 400, description = "Missing file, bad type or not text", body = ErrorResponse),
        (status = 413, description = "Upload too large", body = ErrorResponse),
        (status = 500, description = "Storage error", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let mut multipart = multipart.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    let limit = state.config.max_upload_bytes;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut file_type: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| multipart_error(e, limit))?;
                file = Some((name, bytes.to_vec()));
            }
            Some("type") => {
                file_type = Some(field.text().await.map_err(|e| multipart_error(e, limit))?);
            }
            other => tracing::debug!("Ignoring multipart field {:?}", other),
        }
    }

    let (filename, bytes) = file
        .filter(|(name, _)| !name.is_empty())
        .ok_or(ApiError::MissingField("file"))?;

    let outcome = state
        .loader
        .handle_upload(&filename, &bytes, file_type.as_deref())
        .await?;

    tracing::info!(
        "Uploaded {} as {} ({} characters)",
        filename,
        outcome.file.id,
        outcome.content_length
    );
    Ok((StatusCode::OK, Json(outcome.into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Area;
    use axum::{Router, body::Body, http::Request, routing::post};
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "X-TEST-BOUNDARY";

    fn app(state: AppState) -> Router {
        Router::new()
            .route(routes::UPLOAD, post(upload_handler))
            .with_state(state)
    }

    fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, filename, content) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match filename {
                Some(f) => body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, f
                    )
                    .as_bytes(),
                ),
                None => body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                ),
            }
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn upload(state: AppState, body: Vec<u8>) -> (StatusCode, Value) {
        upload_to(app(state), body).await
    }

    async fn upload_to(router: Router, body: Vec<u8>) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/upload")
                    .header(
                        "content-type",
                        format!("multipart/form-data; boundary={}", BOUNDARY),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_upload_endpoint_success() {
        let (_dir, state) = AppState::for_tests().await;
        let store = state.store.clone();

        let body = multipart_body(&[
            ("file", Some("notes.md"), b"# Title\r\n\r\nFirst paragraph.\r\n\r\n\r\nSecond."),
            ("type", None, b"markdown"),
        ]);
        let (status, json) = upload(state, body).await;

        assert_eq!(status, StatusCode::OK);
        let response: UploadResponse = serde_json::from_value(json).unwrap();
        assert!(response.success);
        assert_eq!(response.file.original_filename, "notes.md");
        assert!(response.file.id.starts_with("notes_"));
        assert_eq!(response.file.file_type, "markdown");
        assert_eq!(response.content_preview, "# Title\n\nFirst paragraph.\n\nSecond.");
        assert_eq!(response.content_length, response.content_preview.chars().count());

        let loaded = store.list_json(Area::Load).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].stem, response.file.id);
    }

    #[tokio::test]
    async fn test_upload_endpoint_over_limit() {
        let (_dir, state) = AppState::for_tests_with(|config| config.max_upload_bytes = 64).await;
        let store = state.store.clone();

        let content = vec![b'a'; 4096];
        let body = multipart_body(&[("file", Some("big.txt"), &content)]);
        let (status, json) = upload_to(routes::api_router(state), body).await;

        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(json["error"], "Upload exceeds the limit of 64 bytes");
        assert!(store.list_json(Area::Load).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_endpoint_missing_file() {
        let (_dir, state) = AppState::for_tests().await;

        let (status, json) = upload(state, multipart_body(&[("type", None, b"auto")])).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: ErrorResponse = serde_json::from_value(json).unwrap();
        assert!(!error.success);
        assert_eq!(error.error, "Missing required field: file");
    }

    #[tokio::test]
    async fn test_upload_endpoint_disallowed_extension() {
        let (_dir, state) = AppState::for_tests().await;

        let body = multipart_body(&[("file", Some("tool.exe"), b"MZ")]);
        let (status, json) = upload(state, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("not allowed"));
    }

    #[tokio::test]
    async fn test_upload_endpoint_binary_content() {
        let (_dir, state) = AppState::for_tests().await;
        let upload_dir = state.store.dir(Area::Upload);

        let body = multipart_body(&[("file", Some("data.txt"), &[0xff, 0xfe, 0x00, 0x80])]);
        let (status, _) = upload(state, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(upload_dir).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_upload_endpoint_not_multipart() {
        let (_dir, state) = AppState::for_tests().await;

        let response = app(state)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/upload")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
