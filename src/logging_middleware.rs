// src/logging_middleware.rs
//! Middleware for logging requests in debug mode

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::debug;

/// Logs method, path, status and latency of every request
///
/// Only the path is logged: OAuth callbacks carry `code` and `state` in the
/// query string.
pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    debug!(method = %method, path = %path, "📥 Request");

    let response = next.run(request).await;

    debug!(
        method = %method,
        path = %path,
        status = %response.status(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "📤 Response"
    );

    response
}
