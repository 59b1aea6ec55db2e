use crate::error::ErrorResponse;
use crate::routes;
use crate::state::AppState;
use crate::views::Navigation;
use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
};

const NOT_FOUND_PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n  \
    <head><meta charset=\"utf-8\"><title>Not found</title></head>\n  \
    <body><h1>404</h1><p>Page not found.</p></body>\n</html>\n";

fn is_api_path(path: &str) -> bool {
    path == routes::API_PREFIX || path.starts_with(&format!("{}/", routes::API_PREFIX))
}

/// Fallback handler - Serve front-end navigations
///
/// Unknown `/api` paths answer a JSON 404. Everything else goes through the
/// view route table: redirects answer 307, views answer the HTML shell.
pub async fn view_fallback_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
) -> Response {
    let path = uri.path();

    if is_api_path(path) {
        tracing::warn!("No API route for {} {}", method, path);
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                success: false,
                error: format!("No API route for {} {}", method, path),
            }),
        )
            .into_response();
    }

    if method != Method::GET && method != Method::HEAD {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    match state.views.navigate(path) {
        Navigation::Redirect(location) => {
            tracing::debug!("Redirecting {} to {}", path, location);
            Redirect::temporary(&location).into_response()
        }
        Navigation::Shell(resolved) => {
            tracing::debug!("Serving view '{}' for {}", resolved.name(), path);
            Html(state.views.shell(&resolved)).into_response()
        }
        Navigation::NotFound => {
            tracing::debug!("No view for {}", path);
            (StatusCode::NOT_FOUND, Html(NOT_FOUND_PAGE)).into_response()
        }
    }
}
