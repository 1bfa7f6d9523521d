//! Request Pipeline (spec §4.8, component C8).
//!
//! Orchestrates authentication (already applied as middleware by the time
//! a handler reaches this module) → rate-limit admission → backend
//! forwarding → usage capture, for both the buffered and streaming chat-
//! completion entry points. Both `/v1/chat/completions` and
//! `/v1/chat/completions/upload` funnel through the same function after
//! normalizing their respective inputs into a `ChatCompletionRequest`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use uuid::Uuid;

use crate::auth::Identity;
use crate::backend::types::{BackendChatRequest, BackendOptions};
use crate::backend::{self, BackendClient};
use crate::error::AppError;
use crate::openai::{
    ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ResponseMessage, UsageObject,
};
use crate::usage_tracker::{RequestContext, UsageTracker};

const PROMPT_PREVIEW_LEN: usize = 200;

/// Rate-limit admission (spec §4.4) runs as a middleware layer ahead of
/// this handler (see `middleware::rate_limit_gate`), so by the time a
/// request reaches here it has already been admitted.
pub struct PipelineDeps {
    pub backend: BackendClient,
    pub usage_tracker: Arc<UsageTracker>,
}

/// Entry point shared by the JSON and multipart chat-completion routes.
pub async fn handle_chat_completion(
    deps: &PipelineDeps,
    identity: Identity,
    request_id: String,
    request: ChatCompletionRequest,
) -> Result<Response, AppError> {
    let user = match identity {
        Identity::User(user) => user,
        Identity::Admin => return Err(AppError::Forbidden),
    };

    let now = chrono::Utc::now().timestamp();
    let payload = translate(&deps.backend, &request).await?;
    let prompt_preview = preview(&request);
    let ctx = RequestContext {
        user_id: user.id.clone(),
        model: request.model.clone(),
        request_id: request_id.clone(),
        prompt_preview,
        timestamp: now,
    };

    if request.stream {
        let backend_stream = deps.backend.chat_stream(payload).await?;
        let chunk_id = format!("chatcmpl-{}", Uuid::new_v4());
        let wants_usage = request.wants_usage();
        let stream = deps
            .usage_tracker
            .clone()
            .spawn_stream(backend_stream, ctx, wants_usage, chunk_id);
        let mut response = Response::new(Body::from_stream(stream));
        response
            .headers_mut()
            .insert(axum::http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        Ok(response)
    } else {
        let backend_response = deps.backend.chat(payload).await?;
        let input_tokens = backend_response.prompt_eval_count.unwrap_or(0);
        let output_tokens = backend_response.eval_count.unwrap_or(0);
        deps.usage_tracker
            .record_buffered(&ctx, input_tokens, output_tokens)
            .map_err(AppError::from)?;

        let response = ChatCompletionResponse {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            object: "chat.completion",
            created: now,
            model: backend_response.model,
            choices: vec![ChatCompletionChoice {
                index: 0,
                message: ResponseMessage {
                    role: "assistant",
                    content: backend_response.message.content,
                },
                finish_reason: "stop",
            }],
            usage: UsageObject::new(input_tokens, output_tokens),
        };
        Ok((StatusCode::OK, Json(response)).into_response())
    }
}

async fn translate(
    backend: &BackendClient,
    request: &ChatCompletionRequest,
) -> Result<BackendChatRequest, AppError> {
    let messages = backend.translate_messages(&request.messages).await?;
    let format = backend::BackendClient::translate_response_format(
        request.response_format.as_ref().map(|f| f.kind.as_str()),
    );
    let options: Option<BackendOptions> = backend::default_options(request.temperature, request.max_tokens);
    Ok(BackendChatRequest {
        model: request.model.clone(),
        messages,
        stream: request.stream,
        format,
        options,
    })
}

fn preview(request: &ChatCompletionRequest) -> String {
    let text = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.text())
        .unwrap_or_default();
    text.chars().take(PROMPT_PREVIEW_LEN).collect()
}
