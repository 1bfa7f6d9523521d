//! Request logging middleware: method, path, status, latency, and the
//! correlation id once `correlation::assign_correlation_id` has run.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn, Span};

use crate::correlation::RequestId;

pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let span = tracing::info_span!(
        "http_request",
        method = %method,
        path = %path,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );
    let _guard = span.enter();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status().as_u16();
    Span::current().record("status", status);
    Span::current().record("latency_ms", latency.as_millis() as u64);

    if status >= 500 {
        warn!(method = %method, path = %path, status, latency_ms = latency.as_millis(), request_id, "request failed");
    } else {
        info!(method = %method, path = %path, status, latency_ms = latency.as_millis(), request_id, "request completed");
    }

    response
}
