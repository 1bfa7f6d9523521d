use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::auth::generate_api_key;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub id: String,
}

#[derive(Serialize)]
pub struct CreatedUser {
    pub id: String,
    pub api_key: String,
    pub created_at: i64,
}

#[derive(Serialize)]
pub struct UserSummary {
    pub id: String,
    pub created_at: i64,
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.id.trim().is_empty() {
        return Err(AppError::InvalidRequest("user id must not be empty".to_string()));
    }
    let api_key = generate_api_key(&request.id);
    let created_at = chrono::Utc::now().timestamp();
    let user = state.store.create_user(&request.id, &api_key, created_at)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedUser {
            id: user.id,
            api_key: user.api_key,
            created_at: user.created_at,
        }),
    ))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let users = state.store.list_users()?;
    let summaries: Vec<UserSummary> = users
        .into_iter()
        .map(|u| UserSummary {
            id: u.id,
            created_at: u.created_at,
        })
        .collect();
    Ok(Json(summaries))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let existed = state.store.delete_user(&user_id)?;
    if existed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::InvalidRequest(format!("no such user: {user_id}")))
    }
}
