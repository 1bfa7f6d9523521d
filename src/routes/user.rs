//! Read-only user-facing surfaces: model list, usage totals/history, and
//! the current price book (spec §6).

use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::auth::Identity;
use crate::error::AppError;
use crate::openai::{ModelEntry, ModelList};
use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let models = state.backend.list_models().await?;
    let data = models
        .models
        .into_iter()
        .map(|m| ModelEntry {
            id: m.name,
            object: "model",
            owned_by: "tollgate",
        })
        .collect();
    Ok(Json(ModelList { object: "list", data }))
}

#[derive(Serialize)]
pub struct UsageTotals {
    pub models: Vec<ModelUsage>,
    pub request_count: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
}

#[derive(Serialize)]
pub struct ModelUsage {
    pub model: String,
    pub request_count: i64,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
}

pub async fn usage_totals(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(identity)?;
    let rows = state.store.usage_totals(&user.id)?;

    let mut request_count = 0;
    let mut total_tokens = 0;
    let mut total_cost = 0.0;
    let models = rows
        .into_iter()
        .map(|(model, count, input_tokens, output_tokens, cost)| {
            request_count += count;
            total_tokens += input_tokens + output_tokens;
            total_cost += cost;
            ModelUsage {
                model,
                request_count: count,
                input_tokens,
                output_tokens,
                cost,
            }
        })
        .collect();

    Ok(Json(UsageTotals {
        models,
        request_count,
        total_tokens,
        total_cost,
    }))
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

pub async fn usage_history(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = require_user(identity)?;
    let rows = state.store.usage_history(&user.id, query.limit, query.offset)?;
    Ok(Json(rows))
}

pub async fn pricing(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let prices = state.price_book.list()?;
    Ok(Json(prices))
}

fn require_user(identity: Identity) -> Result<crate::store::User, AppError> {
    match identity {
        Identity::User(user) => Ok(user),
        Identity::Admin => Err(AppError::Forbidden),
    }
}
