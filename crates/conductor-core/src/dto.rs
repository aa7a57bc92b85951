//! Chat-completion wire types
//!
//! OpenAI-compatible request/response envelopes, plus the conductor-specific
//! fields (`provider`, `provider_key_name`, `priority`) layered on top.

use serde::{Deserialize, Serialize};

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_top_p() -> f32 {
    1.0
}

/// Role of a message sender, OpenAI-compatible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Inbound `POST /v1/chat/completions` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<Message>,

    /// Unified model name; if absent the conductor's configured default is used.
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Must be `false`; streaming is not supported (rejected at the HTTP boundary).
    #[serde(default)]
    pub stream: bool,

    #[serde(default)]
    pub stop: Option<Vec<String>>,

    /// Force a specific provider adapter by name.
    #[serde(default)]
    pub provider: Option<String>,

    /// Advisory priority, 0-10. Not currently consulted by the scheduler.
    #[serde(default)]
    pub priority: u8,
}

/// A single completion choice.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: String,
}

/// Token usage reported by the upstream provider.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Outbound chat-completion response: OpenAI shape plus conductor metadata.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default = "default_object")]
    pub object: String,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Usage,

    /// Which adapter served this request.
    pub provider: String,
    /// Which key within that adapter served this request.
    pub provider_key_name: String,
}

fn default_object() -> String {
    "chat.completion".to_string()
}

/// `POST /v1/batch/chat/completions` body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchRequest {
    pub requests: Vec<ChatCompletionRequest>,
    #[serde(default = "default_true")]
    pub wait_for_all: bool,
}

fn default_true() -> bool {
    true
}

/// One failed entry in a batch response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchFailure {
    pub index: usize,
    pub error: String,
}

/// `POST /v1/batch/chat/completions` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchResponse {
    pub responses: Vec<ChatCompletionResponse>,
    pub failed: Vec<BatchFailure>,
    pub total_time_ms: f64,
}

/// Status of a single provider key's rate-limit bucket, for `GET /status`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderKeyStatus {
    pub provider: String,
    pub key_name: String,
    pub requests_remaining: u32,
    pub tokens_remaining: u32,
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
    pub reset_at: chrono::DateTime<chrono::Utc>,
    pub is_available: bool,
}

/// Aggregated `GET /status` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConductorStatus {
    pub status: String,
    pub scheduling_strategy: String,
    pub total_providers: usize,
    pub total_keys: usize,
    pub available_keys: usize,
    pub pending_requests: usize,
    pub providers: Vec<ProviderKeyStatus>,
}

/// `GET /v1/models` response entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelListEntry {
    pub id: String,
    pub object: String,
}

/// `GET /v1/models` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelListResponse {
    pub data: Vec<ModelListEntry>,
    pub object: String,
    pub default_model: String,
}
