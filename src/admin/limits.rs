use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};

use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::RateLimits;

pub async fn get_limits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let limits = state.store.get_rate_limits(&user_id)?.unwrap_or_else(RateLimits::defaults);
    Ok(Json(limits))
}

pub async fn put_limits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(limits): Json<RateLimits>,
) -> Result<impl IntoResponse, AppError> {
    state.store.set_rate_limits(&user_id, limits.clone())?;
    Ok(Json(limits))
}
