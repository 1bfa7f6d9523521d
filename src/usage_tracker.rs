//! Usage Tracker (spec §4.7, component C7).
//!
//! For buffered responses, a plain synchronous record. For streaming
//! responses, a tee: every backend frame is forwarded to the client
//! verbatim and translated in place; only the terminal `done: true` frame
//! is interpreted, to extract token counts, compute cost, and write the
//! usage row. A mid-stream failure emits an error frame and the
//! terminator but writes nothing — lossy, never overcharging.

use std::sync::Arc;

use axum::body::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::backend::types::BackendChatChunk;
use crate::backend::BackendStream;
use crate::openai::{ChatCompletionChunk, ChunkChoice, ChunkDelta, UsageObject};
use crate::pricing::PriceBook;
use crate::ratelimit::RateLimiter;
use crate::store::{models::UsageInsert, Store, StoreError};

#[derive(Clone)]
pub struct UsageTracker {
    store: Store,
    price_book: PriceBook,
    rate_limiter: Arc<RateLimiter>,
}

/// Identifying context for one request, threaded through both the
/// buffered and streaming recording paths.
pub struct RequestContext {
    pub user_id: String,
    pub model: String,
    pub request_id: String,
    pub prompt_preview: String,
    pub timestamp: i64,
}

impl UsageTracker {
    pub fn new(store: Store, price_book: PriceBook, rate_limiter: Arc<RateLimiter>) -> Self {
        Self {
            store,
            price_book,
            rate_limiter,
        }
    }

    /// Buffered path: the response is fully in hand, so this is a
    /// straight-line cost lookup, row write, and minute-window update.
    pub fn record_buffered(
        &self,
        ctx: &RequestContext,
        input_tokens: i64,
        output_tokens: i64,
    ) -> Result<f64, StoreError> {
        let cost = self.price_book.cost(&ctx.model, input_tokens, output_tokens)?;
        self.store.insert_usage(UsageInsert {
            user_id: &ctx.user_id,
            model: &ctx.model,
            input_tokens,
            output_tokens,
            cost,
            request_id: &ctx.request_id,
            prompt_preview: &ctx.prompt_preview,
            timestamp: ctx.timestamp,
        })?;
        self.rate_limiter.record_post_charge(&ctx.user_id, input_tokens + output_tokens);
        Ok(cost)
    }

    /// Streaming path: spawns a task that tees `backend_stream` into SSE
    /// frames on the returned channel. The backend permit lives inside
    /// `backend_stream` and is released when the task drops it, on every
    /// exit path including the client disconnecting (the `mpsc::Sender`
    /// send failing).
    pub fn spawn_stream(
        self: Arc<Self>,
        mut backend_stream: BackendStream,
        ctx: RequestContext,
        wants_usage: bool,
        chunk_id: String,
    ) -> ReceiverStream<Result<Bytes, std::io::Error>> {
        let (tx, rx) = mpsc::channel::<Result<Bytes, std::io::Error>>(32);

        tokio::spawn(async move {
            let mut sent_role = false;
            let mut completed = false;

            while let Some(item) = backend_stream.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        let _ = tx.send(Ok(error_frame(&err.to_string()))).await;
                        break;
                    }
                };

                if chunk.done {
                    let prompt_tokens = chunk.prompt_eval_count.unwrap_or(0);
                    let completion_tokens = chunk.eval_count.unwrap_or(0);

                    if wants_usage {
                        let usage = UsageObject::new(prompt_tokens, completion_tokens);
                        let frame = ChatCompletionChunk {
                            id: chunk_id.clone(),
                            object: "chat.completion.chunk",
                            created: chrono::Utc::now().timestamp(),
                            model: chunk.model.clone(),
                            choices: vec![],
                            usage: Some(usage),
                        };
                        if tx.send(Ok(sse_frame(&frame))).await.is_err() {
                            return;
                        }
                    }

                    if tx.send(Ok(done_frame())).await.is_err() {
                        return;
                    }

                    match self.record_buffered(&ctx, prompt_tokens, completion_tokens) {
                        Ok(_) => {}
                        Err(err) => {
                            tracing::error!(error = %err, request_id = %ctx.request_id, "failed to persist usage row");
                        }
                    }
                    completed = true;
                    break;
                }

                let delta = forward_delta(&chunk, &mut sent_role);
                let frame = ChatCompletionChunk {
                    id: chunk_id.clone(),
                    object: "chat.completion.chunk",
                    created: chrono::Utc::now().timestamp(),
                    model: chunk.model.clone(),
                    choices: vec![ChunkChoice {
                        index: 0,
                        delta,
                        finish_reason: None,
                    }],
                    usage: None,
                };
                if tx.send(Ok(sse_frame(&frame))).await.is_err() {
                    return;
                }
            }

            if !completed {
                let _ = tx.send(Ok(done_frame())).await;
            }
        });

        ReceiverStream::new(rx)
    }
}

fn forward_delta(chunk: &BackendChatChunk, sent_role: &mut bool) -> ChunkDelta {
    let role = if !*sent_role {
        *sent_role = true;
        Some("assistant")
    } else {
        None
    };
    let content = chunk.message.as_ref().map(|m| m.content.clone());
    ChunkDelta { role, content }
}

fn sse_frame(chunk: &ChatCompletionChunk) -> Bytes {
    let body = serde_json::to_string(chunk).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {body}\n\n"))
}

fn error_frame(message: &str) -> Bytes {
    let body = serde_json::json!({
        "error": { "message": message, "type": "backend_error" }
    });
    Bytes::from(format!("data: {body}\n\n"))
}

fn done_frame() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}
