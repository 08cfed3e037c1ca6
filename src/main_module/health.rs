//! Health check handler

use axum::http::StatusCode;
use axum::Json;

pub async fn health_check_simple() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "helpdesk",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
