use axum::response::IntoResponse;
use axum::Json;

/// Liveness probe
pub async fn ping() -> &'static str {
    "pong"
}

/// Health check endpoint for monitoring and load balancing
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": pdftool::APP_NAME,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
