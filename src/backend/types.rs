//! The backend's native wire shapes (spec §4.6). Field names
//! (`prompt_eval_count`, `eval_count`, `done`) match an Ollama-style local
//! inference server, inferred from the names the spec's response
//! translation rule uses.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct BackendChatRequest {
    pub model: String,
    pub messages: Vec<BackendMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<BackendOptions>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackendOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackendMessage {
    pub role: String,
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// A single buffered (non-streaming) backend response.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendChatResponse {
    pub model: String,
    pub message: BackendResponseMessage,
    #[serde(default)]
    pub done: bool,
    pub prompt_eval_count: Option<i64>,
    pub eval_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendResponseMessage {
    pub role: String,
    pub content: String,
}

/// One NDJSON line of a streaming backend response. The terminal line
/// carries `done: true` plus the token counts; content is empty there.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendChatChunk {
    pub model: String,
    #[serde(default)]
    pub message: Option<BackendResponseMessage>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<i64>,
    #[serde(default)]
    pub eval_count: Option<i64>,
}

/// Native model-list entry, reshaped into `openai::ModelEntry` by the
/// backend client's `/v1/models` proxy.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendModelsResponse {
    pub models: Vec<BackendModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendModelEntry {
    pub name: String,
}
