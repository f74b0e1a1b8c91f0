use axum::{Json, http::StatusCode};
use serde_json::{Value, json};

/// Liveness probe. Always `200 {"status":"ok","up":true}`.
pub async fn health() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "up": true })))
}
