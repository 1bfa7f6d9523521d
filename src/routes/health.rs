//! The two public health paths (spec §4.5): exempt from authentication,
//! unauthenticated liveness/readiness probes for a process supervisor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::state::AppState;

/// Liveness: the process is up and serving. No dependency checks.
pub async fn health() -> &'static str {
    "tollgate ok"
}

/// Readiness: the store connection pool can actually hand out a connection.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.ping() {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "store unavailable"),
    }
}
