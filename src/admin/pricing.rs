use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use crate::store::models::PriceRow;

#[derive(Deserialize)]
pub struct SetPriceRequest {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    #[serde(default = "default_actor")]
    pub actor: String,
}

fn default_actor() -> String {
    "admin".to_string()
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    100
}

pub async fn list_prices(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let prices = state.price_book.list()?;
    Ok(Json(prices))
}

pub async fn set_price(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Json(request): Json<SetPriceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.input_cost_per_million < 0.0 || request.output_cost_per_million < 0.0 {
        return Err(AppError::InvalidRequest("prices must be non-negative".to_string()));
    }
    let row = PriceRow {
        input_cost_per_million: request.input_cost_per_million,
        output_cost_per_million: request.output_cost_per_million,
    };
    let changed_at = chrono::Utc::now().timestamp();
    state.price_book.set(&model, row, &request.actor, changed_at)?;
    Ok(Json(row))
}

pub async fn model_history(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.price_book.history(Some(&model), query.limit)?;
    Ok(Json(history))
}

pub async fn all_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.price_book.history(None, query.limit)?;
    Ok(Json(history))
}
