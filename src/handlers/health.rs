use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Liveness probe.
#[axum::debug_handler]
pub async fn health() -> Response {
    (
        StatusCode::OK,
        r#"{"status":"healthy","service":"supportline"}"#,
    )
        .into_response()
}
