//! `/v1/chat/completions` and the multipart upload variant.

use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::{Extension, Json};

use crate::auth::Identity;
use crate::correlation::RequestId;
use crate::error::AppError;
use crate::image_ingest;
use crate::openai::ChatCompletionRequest;
use crate::pipeline::{self, PipelineDeps};
use crate::state::AppState;

pub async fn chat_completions(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Response, AppError> {
    let deps = pipeline_deps(&state);
    pipeline::handle_chat_completion(&deps, identity, request_id.0, request).await
}

pub async fn chat_completions_upload(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Extension(request_id): Extension<RequestId>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let max_upload_bytes = state.config.max_upload_bytes as usize;
    let allowed_mime = state.config.allowed_image_mime_types();
    let ingested = image_ingest::ingest(multipart, max_upload_bytes, &allowed_mime).await?;

    let request = ChatCompletionRequest {
        model: ingested.model,
        messages: ingested.messages,
        stream: ingested.stream,
        stream_options: None,
        response_format: None,
        temperature: None,
        max_tokens: None,
    };

    let deps = pipeline_deps(&state);
    pipeline::handle_chat_completion(&deps, identity, request_id.0, request).await
}

fn pipeline_deps(state: &AppState) -> PipelineDeps {
    PipelineDeps {
        backend: state.backend.clone(),
        usage_tracker: state.usage_tracker.clone(),
    }
}
