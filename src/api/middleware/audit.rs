//! Access logging middleware.
//!
//! Logs every API request with method, path, status and latency. Logging
//! goes to `tracing` only, never to the database, so report reads stay
//! free of write side effects.

use std::time::Instant;

use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Log API access for the audit trail.
pub async fn log_access(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().to_string();
    // Report tokens are credentials; keep them out of logs.
    let path = redact_path(req.uri().path());
    let started = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        tracing::warn!(%method, %path, status, elapsed_ms, "API request failed");
    } else {
        tracing::info!(%method, %path, status, elapsed_ms, "API request");
    }

    response
}

fn redact_path(path: &str) -> String {
    match path.strip_prefix("/api/reports/") {
        Some(rest) if !rest.is_empty() => "/api/reports/[token]".to_string(),
        _ => path.to_string(),
    }
}
