//! The single edge error type.
//!
//! Every handler in the request pipeline returns `Result<_, AppError>`.
//! Component-internal error types convert into this one at the boundary;
//! the image-URL fetch in the backend client is the one place that
//! deliberately remaps a transport failure into a client error instead of
//! a gateway error (see `backend::BackendError`).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;

use crate::backend::BackendError;
use crate::ratelimit::{RateLimitError, RateLimitRejection};
use crate::store::StoreError;

#[derive(Debug)]
pub enum AppError {
    Unauthenticated,
    Forbidden,
    RateLimited(RateLimitRejection),
    InvalidRequest(String),
    ModelNotFound(String),
    UploadTooLarge,
    UnsupportedMediaType(String),
    BackendUnavailable(String),
    StoreBusy,
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    param: Option<String>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "missing or invalid credential".to_string(),
                "authentication_error",
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "admin path requires an admin credential".to_string(),
                "permission_error",
            ),
            AppError::RateLimited(rejection) => (
                StatusCode::TOO_MANY_REQUESTS,
                rejection.message(),
                "rate_limit_error",
            ),
            AppError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "invalid_request_error")
            }
            AppError::ModelNotFound(model) => (
                StatusCode::NOT_FOUND,
                format!("model not found: {model}"),
                "invalid_request_error",
            ),
            AppError::UploadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "upload exceeds the configured size limit".to_string(),
                "invalid_request_error",
            ),
            AppError::UnsupportedMediaType(mime) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("unsupported file type: {mime}"),
                "invalid_request_error",
            ),
            AppError::BackendUnavailable(msg) => {
                (StatusCode::BAD_GATEWAY, msg.clone(), "backend_error")
            }
            AppError::StoreBusy => (
                StatusCode::SERVICE_UNAVAILABLE,
                "store is busy, retry the request".to_string(),
                "server_error",
            ),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), "server_error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, kind) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail {
                message,
                kind: kind.to_string(),
                param: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Busy => AppError::StoreBusy,
            other if other.is_constraint_violation() => {
                AppError::InvalidRequest("user id or credential already exists".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Rejected(rejection) => AppError::RateLimited(rejection),
            RateLimitError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::NotFound(model) => AppError::ModelNotFound(model),
            BackendError::InvalidRequest(msg) => AppError::InvalidRequest(msg),
            BackendError::Unavailable(msg) => AppError::BackendUnavailable(msg),
            BackendError::ImageFetchFailed(msg) => AppError::InvalidRequest(msg),
        }
    }
}
