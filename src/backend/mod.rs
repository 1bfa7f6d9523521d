//! Backend Client (spec §4.6, component C6).
//!
//! Translates the OpenAI-shaped request to the backend's native shape,
//! forwards it under a process-wide admission semaphore, and translates
//! the response back. The semaphore bounds concurrent in-flight backend
//! calls rather than rejecting excess callers — they queue.

pub mod types;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use base64::Engine;
use bytes::{Buf, BytesMut};
use futures_util::Stream;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::openai::ChatMessage;
use types::{
    BackendChatChunk, BackendChatRequest, BackendChatResponse, BackendMessage,
    BackendModelsResponse, BackendOptions,
};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("model not found: {0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("failed to fetch image_url: {0}")]
    ImageFetchFailed(String),
}

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    semaphore: Arc<Semaphore>,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, max_concurrent: usize, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Copies the OpenAI-shaped message array through, splitting any
    /// `image_url` parts into plain text plus a parallel base64 images
    /// array (spec §4.6). `http(s)` URLs are fetched and encoded; `data:`
    /// URIs are decoded in place. A fetch failure is the one place this
    /// component hands back a client-facing error rather than a gateway
    /// one — the URL came from the client.
    pub async fn translate_messages(&self, messages: &[ChatMessage]) -> Result<Vec<BackendMessage>, BackendError> {
        let mut out = Vec::with_capacity(messages.len());
        for message in messages {
            let mut images = Vec::new();
            for url in message.content.image_urls() {
                images.push(self.resolve_image(url).await?);
            }
            out.push(BackendMessage {
                role: message.role.clone(),
                content: message.content.text(),
                images,
            });
        }
        Ok(out)
    }

    async fn resolve_image(&self, url: &str) -> Result<String, BackendError> {
        if let Some(rest) = url.strip_prefix("data:") {
            let payload = rest
                .split(',')
                .nth(1)
                .ok_or_else(|| BackendError::ImageFetchFailed(format!("malformed data URI: {url}")))?;
            return Ok(payload.to_string());
        }
        if url.starts_with("http://") || url.starts_with("https://") {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| BackendError::ImageFetchFailed(e.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| BackendError::ImageFetchFailed(e.to_string()))?;
            return Ok(base64::engine::general_purpose::STANDARD.encode(bytes));
        }
        Err(BackendError::ImageFetchFailed(format!("unsupported image_url scheme: {url}")))
    }

    /// `response_format.type == "json_object"` becomes `format: "json"` on
    /// the backend call (spec §4.6); anything else is passed through
    /// unset.
    pub fn translate_response_format(kind: Option<&str>) -> Option<String> {
        match kind {
            Some("json_object") => Some("json".to_string()),
            _ => None,
        }
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit, BackendError> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BackendError::Unavailable("backend semaphore closed".to_string()))
    }

    async fn send(&self, payload: &BackendChatRequest) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            404 => Err(BackendError::NotFound(payload.model.clone())),
            400 => Err(BackendError::InvalidRequest(body)),
            _ => Err(BackendError::Unavailable(format!("backend returned {status}: {body}"))),
        }
    }

    /// Buffered chat call: holds the permit for the call's duration only.
    pub async fn chat(&self, payload: BackendChatRequest) -> Result<BackendChatResponse, BackendError> {
        let _permit = self.acquire_permit().await?;
        let response = self.send(&payload).await?;
        response
            .json::<BackendChatResponse>()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    /// Streaming chat call: the returned stream owns the permit and
    /// releases it when dropped, whatever the reason (completion,
    /// mid-stream error, or the client disconnecting).
    pub async fn chat_stream(&self, payload: BackendChatRequest) -> Result<BackendStream, BackendError> {
        let permit = self.acquire_permit().await?;
        let response = self.send(&payload).await?;
        Ok(BackendStream {
            _permit: permit,
            inner: Box::pin(ndjson_lines(response)),
        })
    }

    pub async fn list_models(&self) -> Result<BackendModelsResponse, BackendError> {
        let url = format!("{}/api/tags", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(BackendError::Unavailable(format!("backend returned {}", response.status())));
        }
        response
            .json::<BackendModelsResponse>()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }
}

pub fn default_options(temperature: Option<f64>, max_tokens: Option<i64>) -> Option<BackendOptions> {
    if temperature.is_none() && max_tokens.is_none() {
        return None;
    }
    Some(BackendOptions {
        temperature,
        num_predict: max_tokens,
    })
}

/// A stream of parsed NDJSON backend chunks, holding the backend
/// semaphore permit for its entire lifetime.
pub struct BackendStream {
    _permit: OwnedSemaphorePermit,
    inner: Pin<Box<dyn Stream<Item = Result<BackendChatChunk, BackendError>> + Send>>,
}

impl Stream for BackendStream {
    type Item = Result<BackendChatChunk, BackendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct NdjsonState {
    response: Option<reqwest::Response>,
    buf: BytesMut,
}

/// Splits the backend's newline-delimited JSON response into typed
/// chunks. Forwards frames as they arrive; never buffers the whole body
/// (spec §9 "streaming tee → explicit transformer").
fn ndjson_lines(response: reqwest::Response) -> impl Stream<Item = Result<BackendChatChunk, BackendError>> {
    let initial = NdjsonState {
        response: Some(response),
        buf: BytesMut::new(),
    };
    futures_util::stream::unfold(initial, |mut state| async move {
        loop {
            if let Some(pos) = state.buf.iter().position(|&b| b == b'\n') {
                let mut line = state.buf.split_to(pos);
                state.buf.advance(1);
                trim_trailing_cr(&mut line);
                if line.is_empty() {
                    continue;
                }
                let parsed = serde_json::from_slice::<BackendChatChunk>(&line)
                    .map_err(|e| BackendError::Unavailable(format!("malformed stream frame: {e}")));
                return Some((parsed, state));
            }

            let Some(resp) = state.response.as_mut() else {
                return None;
            };
            match resp.chunk().await {
                Ok(Some(bytes)) => state.buf.extend_from_slice(&bytes),
                Ok(None) => {
                    state.response = None;
                    if state.buf.is_empty() {
                        return None;
                    }
                    let mut line = state.buf.split();
                    trim_trailing_cr(&mut line);
                    if line.is_empty() {
                        return None;
                    }
                    let parsed = serde_json::from_slice::<BackendChatChunk>(&line)
                        .map_err(|e| BackendError::Unavailable(format!("malformed stream frame: {e}")));
                    return Some((parsed, state));
                }
                Err(e) => {
                    state.response = None;
                    return Some((Err(BackendError::Unavailable(e.to_string())), state));
                }
            }
        }
    })
}

fn trim_trailing_cr(line: &mut BytesMut) {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
}

/// Builds a `BackendStream` over a fixed sequence of already-parsed chunks,
/// bypassing the network entirely. Used by `usage_tracker`'s streaming
/// tests to exercise the tee without a live backend.
#[cfg(test)]
pub(crate) fn test_stream(chunks: Vec<Result<BackendChatChunk, BackendError>>) -> BackendStream {
    let semaphore = Arc::new(Semaphore::new(1));
    let permit = semaphore.try_acquire_owned().expect("fresh semaphore has a permit");
    BackendStream {
        _permit: permit,
        inner: Box::pin(futures_util::stream::iter(chunks)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_object_response_format_maps_to_json() {
        assert_eq!(
            BackendClient::translate_response_format(Some("json_object")),
            Some("json".to_string())
        );
        assert_eq!(BackendClient::translate_response_format(None), None);
        assert_eq!(BackendClient::translate_response_format(Some("text")), None);
    }
}
