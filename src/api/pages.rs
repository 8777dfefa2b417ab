//! Browser front end

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};

use super::ApiState;
use super::process::ErrorResponse;

/// Build the page router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/", get(index)).with_state(state)
}

/// Serve `templates/index.html` from the web directory
async fn index(State(state): State<Arc<ApiState>>) -> Response {
    let path = state.web_dir.join("templates").join("index.html");

    match tokio::fs::read_to_string(&path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "index page unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    detail: "index.html not found".to_string(),
                }),
            )
                .into_response()
        }
    }
}
