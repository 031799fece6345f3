pub mod auth;
pub mod records;

use axum::Json;
use serde_json::{Value, json};

pub async fn health() -> Json<Value> {
    Json(json!({ "success": true, "message": "ok" }))
}
