//! HTTP handlers
//!
//! Thin translation layer: parse the inbound envelope, call
//! `Scheduler::submit`, map the core's error taxonomy onto HTTP status
//! codes. No scheduling or rate-limit logic lives here.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;

use conductor_core::{
    BatchFailure, BatchRequest, BatchResponse, ChatCompletionRequest, ChatCompletionResponse,
    ConductorError, ConductorStatus, ModelListEntry, ModelListResponse,
};

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

fn error_code(err: &ConductorError) -> &'static str {
    match err {
        ConductorError::QueueFull => "QUEUE_FULL",
        ConductorError::Timeout => "TIMEOUT",
        ConductorError::NoCapacity => "NO_CAPACITY",
        ConductorError::Provider { .. } => "PROVIDER_ERROR",
        ConductorError::Config(_) => "CONFIG_ERROR",
        ConductorError::ShuttingDown => "SHUTTING_DOWN",
        ConductorError::UnsupportedFeature(_) => "UNSUPPORTED_FEATURE",
    }
}

/// Maps a `ConductorError` onto its HTTP status: 503 for
/// `QueueFull`/`NoCapacity`/`Config`/`ShuttingDown`, 504 for `Timeout`, 500
/// for `Provider`, 400 for `UnsupportedFeature`.
impl IntoResponse for ErrorEnvelope {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
            code: error_code(&self.0),
        });
        (status, body).into_response()
    }
}

/// Wrapper so `ConductorError` (defined in another crate) can implement
/// Axum's `IntoResponse` here.
pub struct ErrorEnvelope(pub ConductorError);

impl From<ConductorError> for ErrorEnvelope {
    fn from(err: ConductorError) -> Self {
        Self(err)
    }
}

/// `GET /health`
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// `GET /status`
pub async fn status(State(state): State<AppState>) -> Json<ConductorStatus> {
    Json(state.scheduler.status())
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<AppState>) -> Json<ModelListResponse> {
    let mut data: Vec<ModelListEntry> = state
        .model_map
        .available_models()
        .into_iter()
        .map(|id| ModelListEntry {
            id,
            object: "model".to_string(),
        })
        .collect();
    data.sort_by(|a, b| a.id.cmp(&b.id));

    Json(ModelListResponse {
        data,
        object: "list".to_string(),
        default_model: conductor_core::model_map::DEFAULT_MODEL.to_string(),
    })
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    Json(request): Json<ChatCompletionRequest>,
) -> Result<Json<ChatCompletionResponse>, ErrorEnvelope> {
    let response = state.scheduler.submit(request).await?;
    Ok(Json(response))
}

/// `POST /v1/batch/chat/completions`
///
/// Every sub-request is submitted concurrently. With `wait_for_all`, all
/// outcomes are gathered before responding, in submission order. Otherwise
/// responses are emitted in completion order, which may not match submission
/// order — only the `failed[].index` still refers back to the original
/// position in `requests`.
pub async fn batch_chat_completions(
    State(state): State<AppState>,
    Json(batch): Json<BatchRequest>,
) -> Json<BatchResponse> {
    let start = std::time::Instant::now();

    if batch.wait_for_all {
        let futures: FuturesUnordered<_> = batch
            .requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let state = state.clone();
                async move { (index, state.scheduler.submit(request).await) }
            })
            .collect();

        let mut indexed: Vec<(usize, Result<ChatCompletionResponse, ConductorError>)> =
            futures.collect().await;
        indexed.sort_by_key(|(index, _)| *index);

        let mut responses = Vec::new();
        let mut failed = Vec::new();
        for (index, outcome) in indexed {
            match outcome {
                Ok(response) => responses.push(response),
                Err(err) => failed.push(BatchFailure {
                    index,
                    error: err.to_string(),
                }),
            }
        }

        Json(BatchResponse {
            responses,
            failed,
            total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    } else {
        let mut futures: FuturesUnordered<_> = batch
            .requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                let state = state.clone();
                async move { (index, state.scheduler.submit(request).await) }
            })
            .collect();

        let mut responses = Vec::new();
        let mut failed = Vec::new();
        while let Some((index, outcome)) = futures.next().await {
            match outcome {
                Ok(response) => responses.push(response),
                Err(err) => failed.push(BatchFailure {
                    index,
                    error: err.to_string(),
                }),
            }
        }

        Json(BatchResponse {
            responses,
            failed,
            total_time_ms: start.elapsed().as_secs_f64() * 1000.0,
        })
    }
}
