//! Rate-limit admission middleware (spec §4.4, component C4).
//!
//! Applied as a blanket layer ahead of every `/v1/*` user route, after
//! `auth::require_auth` has already inserted an `Identity` into the
//! request extensions. Admin routes never pass through this layer.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::auth::Identity;
use crate::error::AppError;
use crate::state::AppState;

pub async fn rate_limit_gate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = req
        .extensions()
        .get::<Identity>()
        .cloned()
        .ok_or(AppError::Unauthenticated)?;

    let user = match identity {
        Identity::User(user) => user,
        Identity::Admin => return Ok(next.run(req).await),
    };

    let now = chrono::Utc::now().timestamp();
    state.rate_limiter.pre_admit(&user.id, now)?;

    Ok(next.run(req).await)
}
