// src/health.rs
//! Liveness endpoint

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({ "ok": true }))
}

pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}
