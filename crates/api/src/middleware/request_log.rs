//! Per-request access logging.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

use super::request_id::RequestId;

/// Log every request on entry and completion.
///
/// Server errors are logged at error level, everything else at info.
pub async fn request_log_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_owned())
        .unwrap_or_default();

    tracing::info!(%method, %path, %request_id, "Request started");
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    if response.status().is_server_error() {
        tracing::error!(%method, %path, %request_id, status, latency_ms, "Request failed");
    } else {
        tracing::info!(%method, %path, %request_id, status, latency_ms, "Request completed");
    }

    response
}
